//! Pre-order traversal over the syntax tree.
//!
//! A `Visitor` sees every statement, property and expression in document
//! order together with its ancestor chain. Each callback decides whether to
//! descend (`Continue`), prune the subtree (`Skip`) or substitute the node
//! (`Replace`). Replacements are collected rather than applied in place; the
//! emitter splices them back into the original source text so untouched code
//! keeps its exact formatting and line numbers.

use crate::ast::*;
use crate::error::Span;
use std::convert::Infallible;

/// Decision returned by a visitor callback.
#[derive(Debug, Clone)]
pub enum Visit<R = Expr> {
    /// Walk into the node's children.
    Continue,
    /// Leave the node and all its children alone.
    Skip,
    /// Substitute the node. The walker does not descend into it.
    Replace(R),
}

/// A borrowed ancestor of the node currently being visited.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Prop(&'a Prop),
}

impl<'a> NodeRef<'a> {
    pub fn span(&self) -> Span {
        match self {
            NodeRef::Stmt(s) => s.span,
            NodeRef::Expr(e) => e.span,
            NodeRef::Prop(p) => p.span,
        }
    }

    pub fn as_expr(&self) -> Option<&'a Expr> {
        match self {
            NodeRef::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_prop(&self) -> Option<&'a Prop> {
        match self {
            NodeRef::Prop(p) => Some(p),
            _ => None,
        }
    }
}

/// An expression to be printed in place of the source text under `span`.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub span: Span,
    pub expr: Expr,
}

/// Callbacks for [`walk`]. `ancestors` runs from the root (outermost) to the
/// direct parent.
pub trait Visitor<'a> {
    fn stmt(&mut self, _stmt: &'a Stmt, _ancestors: &[NodeRef<'a>]) -> Visit<Infallible> {
        Visit::Continue
    }

    fn prop(&mut self, _prop: &'a Prop, _ancestors: &[NodeRef<'a>]) -> Visit<Infallible> {
        Visit::Continue
    }

    fn expr(&mut self, _expr: &'a Expr, _ancestors: &[NodeRef<'a>]) -> Visit {
        Visit::Continue
    }
}

/// Walk the whole program, returning the collected replacements in
/// document order.
pub fn walk<'a, V: Visitor<'a>>(program: &'a Program, visitor: &mut V) -> Vec<Replacement> {
    let mut walker = Walker {
        visitor,
        ancestors: Vec::new(),
        replacements: Vec::new(),
    };
    for stmt in &program.body {
        walker.stmt(stmt);
    }
    walker.replacements
}

struct Walker<'a, 'v, V> {
    visitor: &'v mut V,
    ancestors: Vec<NodeRef<'a>>,
    replacements: Vec<Replacement>,
}

impl<'a, V: Visitor<'a>> Walker<'a, '_, V> {
    fn stmt(&mut self, stmt: &'a Stmt) {
        match self.visitor.stmt(stmt, &self.ancestors) {
            Visit::Continue => {}
            Visit::Skip => return,
            Visit::Replace(never) => match never {},
        }

        self.ancestors.push(NodeRef::Stmt(stmt));
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr(e),
            StmtKind::Decl { decls, .. } => {
                for decl in decls {
                    if let Some(init) = &decl.init {
                        self.expr(init);
                    }
                }
            }
            StmtKind::Function { func, .. } => self.function(func),
            StmtKind::Return(arg) => {
                if let Some(arg) = arg {
                    self.expr(arg);
                }
            }
            StmtKind::If { test, cons, alt } => {
                self.expr(test);
                self.stmt(cons);
                if let Some(alt) = alt {
                    self.stmt(alt);
                }
            }
            StmtKind::Block(body) => self.stmts(body),
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(test) = test {
                    self.expr(test);
                }
                if let Some(update) = update {
                    self.expr(update);
                }
                self.stmt(body);
            }
            StmtKind::ForOf { iter, body, .. } => {
                self.expr(iter);
                self.stmt(body);
            }
            StmtKind::While { test, body } => {
                self.expr(test);
                self.stmt(body);
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
        }
        self.ancestors.pop();
    }

    fn stmts(&mut self, body: &'a [Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn function(&mut self, func: &'a Function) {
        match &func.body {
            FunctionBody::Expr(e) => self.expr(e),
            FunctionBody::Block(body) => self.stmts(body),
        }
    }

    fn prop(&mut self, prop: &'a Prop) {
        match self.visitor.prop(prop, &self.ancestors) {
            Visit::Continue => {}
            Visit::Skip => return,
            Visit::Replace(never) => match never {},
        }

        self.ancestors.push(NodeRef::Prop(prop));
        match &prop.kind {
            PropKind::KeyValue { value, .. } => self.expr(value),
            PropKind::Spread(e) => self.expr(e),
        }
        self.ancestors.pop();
    }

    fn expr(&mut self, expr: &'a Expr) {
        match self.visitor.expr(expr, &self.ancestors) {
            Visit::Continue => {}
            Visit::Skip => return,
            Visit::Replace(new) => {
                self.replacements.push(Replacement {
                    span: expr.span,
                    expr: new,
                });
                return;
            }
        }

        self.ancestors.push(NodeRef::Expr(expr));
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::Ident(_) => {}
            ExprKind::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Object(props) => {
                for prop in props {
                    self.prop(prop);
                }
            }
            ExprKind::Spread(e) => self.expr(e),
            ExprKind::Function(func) => self.function(func),
            ExprKind::Unary { arg, .. } => self.expr(arg),
            ExprKind::Update { target, .. } => self.expr(target),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Conditional { test, cons, alt } => {
                self.expr(test);
                self.expr(cons);
                self.expr(alt);
            }
            ExprKind::Assign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Member { object, .. } => self.expr(object),
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
        }
        self.ancestors.pop();
    }
}

/// The nearest ancestor property keyed `key`.
pub fn enclosing_prop<'a>(ancestors: &[NodeRef<'a>], key: &str) -> Option<&'a Prop> {
    ancestors
        .iter()
        .rev()
        .filter_map(NodeRef::as_prop)
        .find(|p| p.key().is_some_and(|k| k.as_str() == key))
}
