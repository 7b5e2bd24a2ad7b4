//! Syntax tree for the sketch language.
//!
//! A small JavaScript-flavoured language: declarations, functions (arrow and
//! classic), arrays, objects, and the usual operators. Every node carries the
//! `Span` it was parsed from; nodes synthesized by a transform carry an empty
//! span and are printed structurally by the emitter.

use crate::error::Span;
use crate::name::Name;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Let,
    Var,
}

impl DeclKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Const => "const",
            Self::Let => "let",
            Self::Var => "var",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Decl {
        kind: DeclKind,
        decls: Vec<Declarator>,
    },
    Function {
        name: Name,
        func: Rc<Function>,
    },
    Return(Option<Expr>),
    If {
        test: Expr,
        cons: Box<Stmt>,
        alt: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: DeclKind,
        target: Pattern,
        iter: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Empty,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    /// A node that has no source text of its own.
    pub fn synthetic(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.span.is_empty()
    }

    /// The literal string value, if this is a string literal.
    pub fn as_str_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The identifier name, if this is a bare identifier.
    pub fn as_ident(&self) -> Option<Name> {
        match self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
        }
    }
}

/// `=` or a compound assignment carrying its arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(Name),
    Array(Vec<Expr>),
    Object(Vec<Prop>),
    /// `...expr` inside an array literal, object literal, or argument list.
    Spread(Box<Expr>),
    Function(Rc<Function>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        prop: Name,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Prop {
    pub kind: PropKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PropKind {
    KeyValue {
        key: Name,
        value: Expr,
        /// `{ pos }` rather than `{ pos: pos }`.
        shorthand: bool,
    },
    Spread(Expr),
}

impl Prop {
    pub fn key(&self) -> Option<Name> {
        match self.kind {
            PropKind::KeyValue { key, .. } => Some(key),
            PropKind::Spread(_) => None,
        }
    }

    pub fn synthetic(key: Name, value: Expr) -> Self {
        Self {
            kind: PropKind::KeyValue {
                key,
                value,
                shorthand: false,
            },
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<Name>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    /// Span of the parameter list. Includes the parentheses when present.
    pub params_span: Span,
    /// Whether the parameter list is parenthesized (`(s) =>` vs `s =>`).
    pub params_parenthesized: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Ident(Name),
    /// `{ a, b: c }` as `(key, binding)` pairs.
    Object(Vec<(Name, Pattern)>),
    /// `[a, , b]`, with holes as `None`.
    Array(Vec<Option<Pattern>>),
}

impl Pattern {
    pub fn as_ident(&self) -> Option<Name> {
        match self.kind {
            PatternKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}
