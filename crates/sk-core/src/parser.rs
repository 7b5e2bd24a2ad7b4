//! Parser for sketch source text → `Program`.
//!
//! Tokens come from the `winnow`-based lexer; this module is a
//! recursive-descent statement parser with precedence climbing for binary
//! operators. Arrow functions are recognised by scanning ahead to the
//! matching `)` and checking for `=>`.

use crate::ast::*;
use crate::error::{SketchError, Span};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::name::Name;
use std::rc::Rc;

type PResult<T> = Result<T, SketchError>;

/// Deepest nesting of statements, expressions or patterns the parser
/// accepts. Later passes recurse over the tree, so this bounds them too.
pub const MAX_NESTING: usize = 64;

/// Parse a sketch source string into a `Program`.
#[must_use = "parsing result should be used"]
pub fn parse_program(source: &str) -> Result<Program, SketchError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let start = parser.peek().span;
    let mut body = Vec::new();

    while !parser.at_eof() {
        body.push(parser.statement()?);
    }

    let span = start.to(parser.peek().span);
    Ok(Program { body, span })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

// ─── Token cursor ────────────────────────────────────────────────────────

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Punct(q) if q == p)
    }

    fn is_keyword(&self, k: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(q) if q == k)
    }

    fn is_ident_named(&self, name: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Ident(n) if n.as_str() == name)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Span> {
        if self.is_punct(p) {
            Ok(self.bump().span)
        } else {
            Err(self.unexpected(&format!("`{p}`")))
        }
    }

    fn eat_semicolon(&mut self) {
        self.eat_punct(";");
    }

    fn at_statement_end(&self) -> bool {
        self.is_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
    }

    fn unexpected(&self, expected: &str) -> SketchError {
        let tok = self.peek();
        SketchError::parse(
            format!("expected {expected}, found {}", describe(&tok.kind)),
            tok.span,
        )
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> PResult<T>) -> PResult<T> {
        let outer = self.depth;
        let out = self.deepen().and_then(|()| parse(self));
        self.depth = outer;
        out
    }

    /// Go one level deeper without coming back. Loops that build left-deep
    /// chains (`a.b.c`, `1 + 2 + 3`) call this per link and restore `depth`
    /// themselves.
    fn deepen(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(SketchError::parse(
                format!("nesting is deeper than {MAX_NESTING} levels"),
                self.peek().span,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Index of the token closing the bracket opened at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, tok) in self.tokens.iter().enumerate().skip(open) {
            match tok.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number `{n}`"),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Keyword(k) => format!("`{k}`"),
        TokenKind::Punct(p) => format!("`{p}`"),
        TokenKind::Eof => "end of input".to_string(),
    }
}

// ─── Statements ──────────────────────────────────────────────────────────

impl Parser {
    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::bare_statement)
    }

    fn bare_statement(&mut self) -> PResult<Stmt> {
        let start = self.peek().span;
        let kind = match self.peek().kind.clone() {
            TokenKind::Keyword("const" | "let" | "var") => {
                let (kind, decls) = self.declaration()?;
                self.eat_semicolon();
                StmtKind::Decl { kind, decls }
            }
            TokenKind::Keyword("function") => {
                self.bump();
                let name = self.binding_name()?;
                let func = self.function_rest(start, Some(name))?;
                StmtKind::Function { name, func }
            }
            TokenKind::Keyword("return") => {
                self.bump();
                let arg = if self.at_statement_end() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.eat_semicolon();
                StmtKind::Return(arg)
            }
            TokenKind::Keyword("if") => {
                self.bump();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let cons = Box::new(self.statement()?);
                let alt = if self.is_keyword("else") {
                    self.bump();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                StmtKind::If { test, cons, alt }
            }
            TokenKind::Keyword("for") => self.for_statement()?,
            TokenKind::Keyword("while") => {
                self.bump();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                StmtKind::While { test, body }
            }
            TokenKind::Keyword("break") => {
                self.bump();
                self.eat_semicolon();
                StmtKind::Break
            }
            TokenKind::Keyword("continue") => {
                self.bump();
                self.eat_semicolon();
                StmtKind::Continue
            }
            TokenKind::Punct("{") => StmtKind::Block(self.block()?),
            TokenKind::Punct(";") => {
                self.bump();
                StmtKind::Empty
            }
            _ => {
                let expr = self.expression()?;
                if !self.at_statement_end() {
                    return Err(self.unexpected("`;`"));
                }
                self.eat_semicolon();
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt {
            kind,
            span: start.to(self.prev_span()),
        })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.statement()?);
        }
        self.bump();
        Ok(body)
    }

    fn declaration(&mut self) -> PResult<(DeclKind, Vec<Declarator>)> {
        let kind = match self.bump().kind {
            TokenKind::Keyword("const") => DeclKind::Const,
            TokenKind::Keyword("let") => DeclKind::Let,
            _ => DeclKind::Var,
        };
        let mut decls = Vec::new();
        loop {
            let target = self.pattern()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            decls.push(Declarator { target, init });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok((kind, decls))
    }

    fn for_statement(&mut self) -> PResult<StmtKind> {
        self.bump();
        self.expect_punct("(")?;

        let mut init = None;
        if matches!(self.peek().kind, TokenKind::Keyword("const" | "let" | "var")) {
            let checkpoint = self.pos;
            let start = self.peek().span;
            let kind = match self.bump().kind {
                TokenKind::Keyword("const") => DeclKind::Const,
                TokenKind::Keyword("let") => DeclKind::Let,
                _ => DeclKind::Var,
            };
            let target = self.pattern()?;
            if self.is_ident_named("of") {
                self.bump();
                let iter = self.expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                return Ok(StmtKind::ForOf {
                    kind,
                    target,
                    iter,
                    body,
                });
            }
            self.pos = checkpoint;
            let (kind, decls) = self.declaration()?;
            init = Some(Box::new(Stmt {
                kind: StmtKind::Decl { kind, decls },
                span: start.to(self.prev_span()),
            }));
        } else if !self.is_punct(";") {
            let expr = self.expression()?;
            let span = expr.span;
            init = Some(Box::new(Stmt {
                kind: StmtKind::Expr(expr),
                span,
            }));
        }
        self.expect_punct(";")?;

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = Box::new(self.statement()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn binding_name(&mut self) -> PResult<Name> {
        match self.peek().kind {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn pattern(&mut self) -> PResult<Pattern> {
        self.nested(Self::bare_pattern)
    }

    fn bare_pattern(&mut self) -> PResult<Pattern> {
        let start = self.peek().span;
        let kind = match self.peek().kind {
            TokenKind::Ident(name) => {
                self.bump();
                PatternKind::Ident(name)
            }
            TokenKind::Punct("{") => {
                self.bump();
                let mut entries = Vec::new();
                while !self.is_punct("}") {
                    let key_span = self.peek().span;
                    let key = self.property_key()?;
                    let binding = if self.eat_punct(":") {
                        self.pattern()?
                    } else {
                        Pattern {
                            kind: PatternKind::Ident(key),
                            span: key_span,
                        }
                    };
                    entries.push((key, binding));
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("}")?;
                PatternKind::Object(entries)
            }
            TokenKind::Punct("[") => {
                self.bump();
                let mut elements = Vec::new();
                while !self.is_punct("]") {
                    if self.eat_punct(",") {
                        elements.push(None);
                        continue;
                    }
                    elements.push(Some(self.pattern()?));
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                PatternKind::Array(elements)
            }
            _ => return Err(self.unexpected("binding pattern")),
        };
        Ok(Pattern {
            kind,
            span: start.to(self.prev_span()),
        })
    }

    /// Parameters after an already-consumed `(`, through the closing `)`.
    fn params_after_open(&mut self) -> PResult<Vec<Pattern>> {
        let mut params = Vec::new();
        while !self.is_punct(")") {
            params.push(self.pattern()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn function_rest(&mut self, start: Span, name: Option<Name>) -> PResult<Rc<Function>> {
        let open = self.expect_punct("(")?;
        let params = self.params_after_open()?;
        let params_span = open.to(self.prev_span());
        let body = self.block()?;
        Ok(Rc::new(Function {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            params_span,
            params_parenthesized: true,
            span: start.to(self.prev_span()),
        }))
    }
}

// ─── Expressions ─────────────────────────────────────────────────────────

enum BinKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Precedence (higher binds tighter) of a binary operator token.
fn binary_op(kind: &TokenKind) -> Option<(u8, BinKind)> {
    let TokenKind::Punct(p) = kind else {
        return None;
    };
    let entry = match *p {
        "??" => (1, BinKind::Logical(LogicalOp::Nullish)),
        "||" => (2, BinKind::Logical(LogicalOp::Or)),
        "&&" => (3, BinKind::Logical(LogicalOp::And)),
        "==" => (4, BinKind::Binary(BinaryOp::Eq)),
        "!=" => (4, BinKind::Binary(BinaryOp::NotEq)),
        "===" => (4, BinKind::Binary(BinaryOp::StrictEq)),
        "!==" => (4, BinKind::Binary(BinaryOp::StrictNotEq)),
        "<" => (5, BinKind::Binary(BinaryOp::Lt)),
        ">" => (5, BinKind::Binary(BinaryOp::Gt)),
        "<=" => (5, BinKind::Binary(BinaryOp::LtEq)),
        ">=" => (5, BinKind::Binary(BinaryOp::GtEq)),
        "+" => (6, BinKind::Binary(BinaryOp::Add)),
        "-" => (6, BinKind::Binary(BinaryOp::Sub)),
        "*" => (7, BinKind::Binary(BinaryOp::Mul)),
        "/" => (7, BinKind::Binary(BinaryOp::Div)),
        "%" => (7, BinKind::Binary(BinaryOp::Rem)),
        "**" => (8, BinKind::Binary(BinaryOp::Pow)),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    match kind {
        TokenKind::Punct("=") => Some(AssignOp::Assign),
        TokenKind::Punct("+=") => Some(AssignOp::Compound(BinaryOp::Add)),
        TokenKind::Punct("-=") => Some(AssignOp::Compound(BinaryOp::Sub)),
        TokenKind::Punct("*=") => Some(AssignOp::Compound(BinaryOp::Mul)),
        TokenKind::Punct("/=") => Some(AssignOp::Compound(BinaryOp::Div)),
        TokenKind::Punct("%=") => Some(AssignOp::Compound(BinaryOp::Rem)),
        TokenKind::Punct("**=") => Some(AssignOp::Compound(BinaryOp::Pow)),
        _ => None,
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
    )
}

impl Parser {
    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::bare_assignment)
    }

    fn bare_assignment(&mut self) -> PResult<Expr> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let left = self.conditional()?;
        let Some(op) = assign_op(&self.peek().kind) else {
            return Ok(left);
        };
        if !is_assignable(&left) {
            return Err(SketchError::parse("invalid assignment target", left.span));
        }
        self.bump();
        let value = self.assignment()?;
        Ok(Expr {
            span: left.span.to(value.span),
            kind: ExprKind::Assign {
                op,
                target: Box::new(left),
                value: Box::new(value),
            },
        })
    }

    fn try_arrow(&mut self) -> PResult<Option<Expr>> {
        let start = self.peek().span;
        match self.peek().kind {
            TokenKind::Ident(name) if self.peek_at(1).kind == TokenKind::Punct("=>") => {
                self.bump();
                self.bump();
                let param = Pattern {
                    kind: PatternKind::Ident(name),
                    span: start,
                };
                self.arrow_body(start, vec![param], start, false).map(Some)
            }
            TokenKind::Punct("(") => {
                let Some(close) = self.matching_close(self.pos) else {
                    return Ok(None);
                };
                if self.tokens[close + 1].kind != TokenKind::Punct("=>") {
                    return Ok(None);
                }
                self.bump();
                let params = self.params_after_open()?;
                let params_span = start.to(self.prev_span());
                self.expect_punct("=>")?;
                self.arrow_body(start, params, params_span, true).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn arrow_body(
        &mut self,
        start: Span,
        params: Vec<Pattern>,
        params_span: Span,
        params_parenthesized: bool,
    ) -> PResult<Expr> {
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };
        let span = start.to(self.prev_span());
        Ok(Expr {
            kind: ExprKind::Function(Rc::new(Function {
                name: None,
                params,
                body,
                is_arrow: true,
                params_span,
                params_parenthesized,
                span,
            })),
            span,
        })
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let cons = self.assignment()?;
        self.expect_punct(":")?;
        let alt = self.assignment()?;
        Ok(Expr {
            span: test.span.to(alt.span),
            kind: ExprKind::Conditional {
                test: Box::new(test),
                cons: Box::new(cons),
                alt: Box::new(alt),
            },
        })
    }

    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let outer = self.depth;
        let out = self.binary_chain(min_prec);
        self.depth = outer;
        out
    }

    fn binary_chain(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.unary()?;
        while let Some((prec, op)) = binary_op(&self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.deepen()?;
            self.bump();
            let right_assoc = matches!(op, BinKind::Binary(BinaryOp::Pow));
            let right = self.binary(if right_assoc { prec } else { prec + 1 })?;
            let span = left.span.to(right.span);
            let (left_box, right_box) = (Box::new(left), Box::new(right));
            left = Expr {
                kind: match op {
                    BinKind::Binary(op) => ExprKind::Binary {
                        op,
                        left: left_box,
                        right: right_box,
                    },
                    BinKind::Logical(op) => ExprKind::Logical {
                        op,
                        left: left_box,
                        right: right_box,
                    },
                },
                span,
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let start = self.peek().span;
        let op = match self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Keyword("typeof") => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let arg = self.nested(Self::unary)?;
            return Ok(Expr {
                span: start.to(arg.span),
                kind: ExprKind::Unary {
                    op,
                    arg: Box::new(arg),
                },
            });
        }

        let update = match self.peek().kind {
            TokenKind::Punct("++") => Some(UpdateOp::Increment),
            TokenKind::Punct("--") => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.bump();
            let target = self.nested(Self::unary)?;
            if !is_assignable(&target) {
                return Err(SketchError::parse("invalid update target", target.span));
            }
            return Ok(Expr {
                span: start.to(target.span),
                kind: ExprKind::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call_member()?;
        let op = match self.peek().kind {
            TokenKind::Punct("++") if !self.peek().newline_before => UpdateOp::Increment,
            TokenKind::Punct("--") if !self.peek().newline_before => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !is_assignable(&expr) {
            return Err(SketchError::parse("invalid update target", expr.span));
        }
        let end = self.bump().span;
        Ok(Expr {
            span: expr.span.to(end),
            kind: ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            },
        })
    }

    fn call_member(&mut self) -> PResult<Expr> {
        let outer = self.depth;
        let out = self.member_chain();
        self.depth = outer;
        out
    }

    fn member_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek().kind, TokenKind::Punct("." | "[" | "(")) {
                self.deepen()?;
            }
            if self.eat_punct(".") {
                let prop = match self.bump().kind {
                    TokenKind::Ident(name) => name,
                    TokenKind::Keyword(k) => Name::intern(k),
                    _ => {
                        return Err(SketchError::parse(
                            "expected property name after `.`",
                            self.prev_span(),
                        ));
                    }
                };
                expr = Expr {
                    span: expr.span.to(self.prev_span()),
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        prop,
                    },
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr {
                    span: expr.span.to(self.prev_span()),
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.eat_punct("(") {
                let args = self.elements(")")?;
                expr = Expr {
                    span: expr.span.to(self.prev_span()),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions (with spread) through the `close` token.
    fn elements(&mut self, close: &str) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.is_punct(close) {
            if self.is_punct("...") {
                let start = self.bump().span;
                let arg = self.assignment()?;
                items.push(Expr {
                    span: start.to(arg.span),
                    kind: ExprKind::Spread(Box::new(arg)),
                });
            } else {
                items.push(self.assignment()?);
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(close)?;
        Ok(items)
    }

    fn property_key(&mut self) -> PResult<Name> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            TokenKind::Keyword(k) => {
                self.bump();
                Ok(Name::intern(k))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Name::intern(&s))
            }
            TokenKind::Number(n) => {
                self.bump();
                Ok(Name::intern(&crate::emitter::format_number(n)))
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    fn object_literal(&mut self) -> PResult<Vec<Prop>> {
        self.expect_punct("{")?;
        let mut props = Vec::new();
        while !self.is_punct("}") {
            let start = self.peek().span;
            let kind = if self.eat_punct("...") {
                PropKind::Spread(self.assignment()?)
            } else {
                let shorthand_ident = matches!(self.peek().kind, TokenKind::Ident(_));
                let key = self.property_key()?;
                if self.eat_punct(":") {
                    PropKind::KeyValue {
                        key,
                        value: self.assignment()?,
                        shorthand: false,
                    }
                } else if self.is_punct("(") {
                    let func = self.function_rest(start, Some(key))?;
                    PropKind::KeyValue {
                        key,
                        value: Expr {
                            span: func.span,
                            kind: ExprKind::Function(func),
                        },
                        shorthand: false,
                    }
                } else if shorthand_ident {
                    PropKind::KeyValue {
                        key,
                        value: Expr {
                            kind: ExprKind::Ident(key),
                            span: start,
                        },
                        shorthand: true,
                    }
                } else {
                    return Err(self.unexpected("`:`"));
                }
            };
            props.push(Prop {
                kind,
                span: start.to(self.prev_span()),
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(props)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let start = self.peek().span;
        let kind = match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.bump();
                ExprKind::Number(n)
            }
            TokenKind::Str(s) => {
                self.bump();
                ExprKind::Str(s)
            }
            TokenKind::Ident(name) => {
                self.bump();
                ExprKind::Ident(name)
            }
            TokenKind::Keyword("true") => {
                self.bump();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword("false") => {
                self.bump();
                ExprKind::Bool(false)
            }
            TokenKind::Keyword("null") => {
                self.bump();
                ExprKind::Null
            }
            TokenKind::Keyword("undefined") => {
                self.bump();
                ExprKind::Undefined
            }
            TokenKind::Keyword("function") => {
                self.bump();
                let name = match self.peek().kind {
                    TokenKind::Ident(name) => {
                        self.bump();
                        Some(name)
                    }
                    _ => None,
                };
                ExprKind::Function(self.function_rest(start, name)?)
            }
            TokenKind::Punct("(") => {
                self.bump();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                return Ok(inner);
            }
            TokenKind::Punct("[") => {
                self.bump();
                ExprKind::Array(self.elements("]")?)
            }
            TokenKind::Punct("{") => ExprKind::Object(self.object_literal()?),
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr {
            kind,
            span: start.to(self.prev_span()),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn first_expr(src: &str) -> Expr {
        let program = parse_program(src).unwrap();
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(e)) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_sketch_call_with_object_argument() {
        let src = r##"sketch({
  size: [600, 600],
  initialState: { c: 0 },
  update: state => state,
  draw: (state) => [["background", { fill: "#eee" }]]
});"##;
        let expr = first_expr(src);
        let ExprKind::Call { callee, args } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.as_ident().map(|n| n.as_str()), Some("sketch"));
        let ExprKind::Object(props) = &args[0].kind else {
            panic!("expected object literal");
        };
        let keys: Vec<_> = props.iter().filter_map(|p| p.key()).map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["size", "initialState", "update", "draw"]);
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = first_expr("1 + 2 * 3;");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn arrow_function_param_spans() {
        let expr = first_expr("(a, b) => a + b;");
        let ExprKind::Function(func) = expr.kind else {
            panic!("expected function");
        };
        assert!(func.is_arrow);
        assert!(func.params_parenthesized);
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params_span.start, 0);
        assert_eq!(func.params_span.end, 6);
    }

    #[test]
    fn bare_param_arrow_is_not_parenthesized() {
        let expr = first_expr("s => ({ c: s.c + 1 });");
        let ExprKind::Function(func) = expr.kind else {
            panic!("expected function");
        };
        assert!(!func.params_parenthesized);
        assert!(matches!(func.body, FunctionBody::Expr(ref e) if matches!(e.kind, ExprKind::Object(_))));
    }

    #[test]
    fn spread_and_method_shorthand() {
        let expr = first_expr("({ draw(s) { return [...s.items]; }, pos });");
        let ExprKind::Object(props) = expr.kind else {
            panic!("expected object");
        };
        assert!(matches!(
            props[0].kind,
            PropKind::KeyValue { value: Expr { kind: ExprKind::Function(_), .. }, .. }
        ));
        assert!(matches!(props[1].kind, PropKind::KeyValue { shorthand: true, .. }));
    }

    #[test]
    fn statements_and_loops() {
        let src = r#"
const { a, b: [c, d] } = obj;
for (let i = 0; i < 3; i++) { if (i === 1) continue; else break; }
for (const p of points) { total += p; }
while (x > 0) x--;
function twice(f) { return f(f(1)); }
"#;
        let program = parse_program(src).unwrap();
        assert_eq!(program.body.len(), 5);
        assert!(matches!(program.body[1].kind, StmtKind::For { .. }));
        assert!(matches!(program.body[2].kind, StmtKind::ForOf { .. }));
        assert!(matches!(program.body[4].kind, StmtKind::Function { .. }));
    }

    #[test]
    fn parse_error_carries_line_and_column() {
        let err = parse_program("sketch({\n  draw: s => [\n})").unwrap_err();
        assert!(matches!(err, SketchError::Parse { .. }));
        assert_eq!(err.position().0, 3);
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let deep = |open: &str, close: &str, n: usize| {
            format!("sketch({{ draw: s => {}1{} }});", open.repeat(n), close.repeat(n))
        };
        assert!(parse_program(&deep("(", ")", 40)).is_ok());

        for src in [
            deep("(", ")", 200),
            deep("[", "]", 200),
            deep("!", "", 200),
            format!("x = {};", vec!["1"; 500].join(" + ")),
            format!("x = a{};", ".b".repeat(500)),
            format!("{}{}", "{".repeat(200), "}".repeat(200)),
        ] {
            let err = parse_program(&src).unwrap_err();
            assert!(matches!(err, SketchError::Parse { .. }));
            assert!(err.message().contains("nesting"), "{}", err.message());
            assert_eq!(err.position().0, 1);
        }
    }

    #[test]
    fn multiline_spans_record_both_lines() {
        let expr = first_expr("[\n  \"rect\",\n  {}\n];");
        assert_eq!(expr.span.line, 1);
        assert_eq!(expr.span.end_line, 4);
    }
}
