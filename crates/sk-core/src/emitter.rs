//! Emitter: prints expressions back to source text.
//!
//! Nodes that came from the source are sliced verbatim so formatting,
//! comments and line breaks survive a rewrite. Synthetic nodes (empty span)
//! are printed structurally on a single line. Array and object literals from
//! the source are rebuilt child by child with the original text between
//! children, so a synthetic child appended deep inside a replaced node
//! lands on the line of its last real sibling.

use crate::ast::*;
use crate::error::Span;
use crate::visit::Replacement;

/// Print a number the way the sketch language reads it back.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Print one expression.
pub fn print(expr: &Expr, source: &str) -> String {
    let mut out = String::new();
    write_expr(expr, source, &mut out);
    out
}

/// Replace the source text under each span. Spans must not overlap.
pub fn splice(source: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, text) in edits {
        if span.start < cursor {
            log::warn!("overlapping edit at byte {} dropped", span.start);
            continue;
        }
        out.push_str(&source[cursor..span.start]);
        out.push_str(&text);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Apply visitor replacements to the source they were collected from.
pub fn apply(source: &str, replacements: &[Replacement]) -> String {
    let edits = replacements
        .iter()
        .map(|r| (r.span, print(&r.expr, source)))
        .collect();
    splice(source, edits)
}

fn write_expr(expr: &Expr, source: &str, out: &mut String) {
    if !expr.is_synthetic() {
        match &expr.kind {
            ExprKind::Array(items) => {
                let children = items.iter().map(|e| (e.span, print(e, source))).collect();
                write_container(source, expr.span, children, out);
            }
            ExprKind::Object(props) => {
                let children = props
                    .iter()
                    .map(|p| {
                        let mut s = String::new();
                        write_prop(p, source, &mut s);
                        (p.span, s)
                    })
                    .collect();
                write_container(source, expr.span, children, out);
            }
            _ => out.push_str(expr.span.text(source)),
        }
        return;
    }

    match &expr.kind {
        ExprKind::Number(n) => out.push_str(&format_number(*n)),
        ExprKind::Str(s) => out.push_str(&quote(s)),
        ExprKind::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ExprKind::Null => out.push_str("null"),
        ExprKind::Undefined => out.push_str("undefined"),
        ExprKind::Ident(name) => out.push_str(name.as_str()),
        ExprKind::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(item, source, out);
            }
            out.push(']');
        }
        ExprKind::Object(props) => {
            if props.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{ ");
            for (i, prop) in props.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_prop(prop, source, out);
            }
            out.push_str(" }");
        }
        ExprKind::Spread(arg) => {
            out.push_str("...");
            write_operand(arg, source, out);
        }
        ExprKind::Function(func) => out.push_str(func.span.text(source)),
        ExprKind::Unary { op, arg } => {
            out.push_str(match op {
                UnaryOp::Neg => "-",
                UnaryOp::Plus => "+",
                UnaryOp::Not => "!",
                UnaryOp::TypeOf => "typeof ",
            });
            write_operand(arg, source, out);
        }
        ExprKind::Update { op, prefix, target } => {
            let op = match op {
                UpdateOp::Increment => "++",
                UpdateOp::Decrement => "--",
            };
            if *prefix {
                out.push_str(op);
            }
            write_operand(target, source, out);
            if !*prefix {
                out.push_str(op);
            }
        }
        ExprKind::Binary { op, left, right } => {
            write_operand(left, source, out);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_operand(right, source, out);
        }
        ExprKind::Logical { op, left, right } => {
            write_operand(left, source, out);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_operand(right, source, out);
        }
        ExprKind::Conditional { test, cons, alt } => {
            write_operand(test, source, out);
            out.push_str(" ? ");
            write_operand(cons, source, out);
            out.push_str(" : ");
            write_operand(alt, source, out);
        }
        ExprKind::Assign { op, target, value } => {
            write_expr(target, source, out);
            match op {
                AssignOp::Assign => out.push_str(" = "),
                AssignOp::Compound(op) => {
                    out.push(' ');
                    out.push_str(op.as_str());
                    out.push_str("= ");
                }
            }
            write_expr(value, source, out);
        }
        ExprKind::Call { callee, args } => {
            write_operand(callee, source, out);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(arg, source, out);
            }
            out.push(')');
        }
        ExprKind::Member { object, prop } => {
            write_operand(object, source, out);
            out.push('.');
            out.push_str(prop.as_str());
        }
        ExprKind::Index { object, index } => {
            write_operand(object, source, out);
            out.push('[');
            write_expr(index, source, out);
            out.push(']');
        }
    }
}

/// Print a bracketed literal from the source, reusing the text between its
/// real children. Synthetic children go after the last real child (or right
/// after the opening bracket when there is none), on the same line.
fn write_container(source: &str, span: Span, children: Vec<(Span, String)>, out: &mut String) {
    let mut cursor = span.start;
    let mut extra = Vec::new();
    for (child, text) in children {
        if child.is_empty() {
            extra.push(text);
            continue;
        }
        out.push_str(&source[cursor..child.start]);
        out.push_str(&text);
        cursor = child.end;
    }
    if extra.is_empty() {
        out.push_str(&source[cursor..span.end]);
        return;
    }

    let extra = extra.join(", ");
    if cursor == span.start {
        out.push_str(&source[span.start..span.start + 1]);
        out.push(' ');
        out.push_str(&extra);
        out.push(' ');
        out.push_str(source[span.start + 1..span.end].trim_start());
    } else {
        out.push_str(", ");
        out.push_str(&extra);
        out.push_str(&source[cursor..span.end]);
    }
}

fn write_prop(prop: &Prop, source: &str, out: &mut String) {
    if !prop.span.is_empty() {
        match &prop.kind {
            PropKind::KeyValue {
                value,
                shorthand: false,
                ..
            }
            | PropKind::Spread(value) => {
                out.push_str(&source[prop.span.start..value.span.start]);
                write_expr(value, source, out);
                out.push_str(&source[value.span.end..prop.span.end]);
            }
            PropKind::KeyValue { .. } => out.push_str(prop.span.text(source)),
        }
        return;
    }
    match &prop.kind {
        PropKind::KeyValue { key, value, .. } => {
            let key = key.as_str();
            if is_identifier(key) {
                out.push_str(key);
            } else {
                out.push_str(&quote(key));
            }
            out.push_str(": ");
            write_expr(value, source, out);
        }
        PropKind::Spread(arg) => {
            out.push_str("...");
            write_operand(arg, source, out);
        }
    }
}

fn write_operand(expr: &Expr, source: &str, out: &mut String) {
    let compound = match &expr.kind {
        ExprKind::Binary { .. }
        | ExprKind::Logical { .. }
        | ExprKind::Conditional { .. }
        | ExprKind::Assign { .. }
        | ExprKind::Function(_)
        | ExprKind::Unary { .. } => true,
        ExprKind::Number(n) => n.is_sign_negative() && *n != 0.0,
        _ => false,
    };
    if compound {
        out.push('(');
        write_expr(expr, source, out);
        out.push(')');
    } else {
        write_expr(expr, source, out);
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::parser::parse_program;
    use pretty_assertions::assert_eq;

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5e-3), "0.0015");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn synthetic_index_expression() {
        let expr = Expr::synthetic(ExprKind::Index {
            object: Box::new(Expr::synthetic(ExprKind::Ident(Name::intern("__constants")))),
            index: Box::new(Expr::synthetic(ExprKind::Number(3.0))),
        });
        assert_eq!(print(&expr, ""), "__constants[3]");
    }

    #[test]
    fn appended_prop_keeps_original_lines() {
        let src = "f({\n  pos: [1, 2],\n  size: 3\n});";
        let program = parse_program(src).unwrap();
        let crate::ast::StmtKind::Expr(call) = &program.body[0].kind else {
            panic!("expected expression");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        let mut object = args[0].clone();
        if let ExprKind::Object(props) = &mut object.kind {
            props.push(Prop::synthetic(
                Name::intern("tag"),
                Expr::synthetic(ExprKind::Str("x".into())),
            ));
        }
        let out = apply(
            src,
            &[Replacement {
                span: object.span,
                expr: object,
            }],
        );
        assert_eq!(out, "f({\n  pos: [1, 2],\n  size: 3, tag: \"x\"\n});");
        assert_eq!(out.lines().count(), src.lines().count());
    }

    #[test]
    fn empty_object_gets_padded_props() {
        let src = "g({});";
        let program = parse_program(src).unwrap();
        let crate::ast::StmtKind::Expr(call) = &program.body[0].kind else {
            panic!("expected expression");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        let mut object = args[0].clone();
        if let ExprKind::Object(props) = &mut object.kind {
            props.push(Prop::synthetic(
                Name::intern("a"),
                Expr::synthetic(ExprKind::Number(1.0)),
            ));
        }
        let out = print(&object, src);
        assert_eq!(out, "{ a: 1 }");
    }

    #[test]
    fn splice_applies_edits_in_order() {
        let src = "abc def ghi";
        let span = |start, end| Span {
            start,
            end,
            ..Span::default()
        };
        let out = splice(
            src,
            vec![(span(8, 11), "3".into()), (span(0, 3), "1".into())],
        );
        assert_eq!(out, "1 def 3");
    }
}
