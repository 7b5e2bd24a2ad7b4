//! Source-to-source passes run before a sketch is evaluated.
//!
//! Each pass parses its input, gathers edits with a [`Visitor`], and splices
//! them into the original text. Passes never add or remove line breaks in
//! front of user code, so `__meta` ranges and error positions computed on a
//! transformed program point at the lines the user typed.
//!
//! Compile order: [`pull_out_constants`] → [`add_meta`] → [`process_require`].

use crate::ast::*;
use crate::builtins::REQUIRE_GLOBAL;
use crate::command::{CommandVocabulary, META_KEY};
use crate::emitter::{self, format_number};
use crate::error::{SketchError, Span};
use crate::lexer::{TokenKind, tokenize};
use crate::name::Name;
use crate::parser::parse_program;
use crate::visit::{NodeRef, Visit, Visitor, walk};
use std::convert::Infallible;

/// Host function a sketch registers itself with.
pub const REGISTRATION: &str = "sketch";

/// Parameter name given to `draw` when it declares fewer than two.
pub const CONSTANTS_PARAM: &str = "__constants";

/// Decimal places kept when constants are written back into source.
pub const DEFAULT_PRECISION: u32 = 3;

/// Output of [`pull_out_constants`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub code: String,
    /// Literal values inside `draw`, in document order.
    pub constants: Vec<f64>,
}

impl Extracted {
    fn unchanged(source: &str) -> Self {
        Self {
            code: source.to_string(),
            constants: Vec::new(),
        }
    }
}

/// Run every pass in compile order.
pub fn compile(source: &str, commands: &dyn CommandVocabulary) -> Result<Extracted, SketchError> {
    let Extracted { code, constants } = pull_out_constants(source)?;
    let code = add_meta(&code, commands)?;
    let code = process_require(&code)?;
    log::debug!("compiled sketch: {} constants", constants.len());
    Ok(Extracted { code, constants })
}

// ─── Registration lookup ─────────────────────────────────────────────────

fn is_registration_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { callee, .. } => callee
            .as_ident()
            .is_some_and(|name| name.as_str() == REGISTRATION),
        _ => false,
    }
}

/// Finds the first `sketch({ ... })` call in document order.
#[derive(Default)]
struct RegistrationFinder<'a> {
    found: Option<(&'a Expr, &'a [Prop])>,
}

impl<'a> Visitor<'a> for RegistrationFinder<'a> {
    fn expr(&mut self, expr: &'a Expr, _ancestors: &[NodeRef<'a>]) -> Visit {
        if self.found.is_some() {
            return Visit::Skip;
        }
        if let ExprKind::Call { args, .. } = &expr.kind {
            if is_registration_call(expr) {
                if let Some(Expr {
                    kind: ExprKind::Object(props),
                    ..
                }) = args.first()
                {
                    self.found = Some((expr, props));
                    return Visit::Skip;
                }
            }
        }
        Visit::Continue
    }
}

/// The `draw` property of the registered object literal.
///
/// `Ok(None)` when there is no registration call, or when the object has no
/// literal `draw` key but spreads another object in (the key may come from
/// there).
fn draw_prop(program: &Program) -> Result<Option<&Prop>, SketchError> {
    let mut finder = RegistrationFinder::default();
    walk(program, &mut finder);
    let Some((call, props)) = finder.found else {
        return Ok(None);
    };
    if let Some(draw) = props
        .iter()
        .find(|p| p.key().is_some_and(|k| k.as_str() == "draw"))
    {
        return Ok(Some(draw));
    }
    if props.iter().any(|p| matches!(p.kind, PropKind::Spread(_))) {
        return Ok(None);
    }
    Err(SketchError::transform(
        "the object passed to sketch() has no `draw` property",
        call.span,
    ))
}

fn draw_function(prop: &Prop) -> Option<&Function> {
    match &prop.kind {
        PropKind::KeyValue {
            value:
                Expr {
                    kind: ExprKind::Function(func),
                    ..
                },
            ..
        } => Some(func),
        _ => None,
    }
}

/// The name `draw` reads constants through, plus the parameter-list edit
/// that introduces it when `draw` takes fewer than two parameters.
fn constants_param(
    func: &Function,
    source: &str,
) -> Result<(Name, Option<(Span, String)>), SketchError> {
    let default = Name::intern(CONSTANTS_PARAM);
    match func.params.as_slice() {
        [] => Ok((
            default,
            Some((func.params_span, format!("(_, {CONSTANTS_PARAM})"))),
        )),
        [first] => Ok((
            default,
            Some((
                func.params_span,
                format!("({}, {CONSTANTS_PARAM})", first.span.text(source)),
            )),
        )),
        [_, second, ..] => second.as_ident().map(|name| (name, None)).ok_or_else(|| {
            SketchError::transform(
                "the second parameter of `draw` must be a plain name",
                second.span,
            )
        }),
    }
}

// ─── Constant extraction ─────────────────────────────────────────────────

/// Collects numeric literals lexically inside one `draw` property.
struct LiteralCollector<'a> {
    draw: &'a Prop,
    constants: Name,
    literals: Vec<(Span, f64)>,
}

impl<'a> Visitor<'a> for LiteralCollector<'a> {
    fn expr(&mut self, expr: &'a Expr, ancestors: &[NodeRef<'a>]) -> Visit {
        match &expr.kind {
            ExprKind::Index { object, .. } if object.as_ident() == Some(self.constants) => {
                Visit::Skip
            }
            ExprKind::Number(n) => {
                let inside = ancestors
                    .iter()
                    .any(|a| matches!(a, NodeRef::Prop(p) if std::ptr::eq(*p, self.draw)));
                if inside {
                    self.literals.push((expr.span, *n));
                }
                Visit::Continue
            }
            _ => Visit::Continue,
        }
    }
}

fn collect_literals<'a>(program: &'a Program, draw: &'a Prop, constants: Name) -> Vec<(Span, f64)> {
    let mut collector = LiteralCollector {
        draw,
        constants,
        literals: Vec::new(),
    };
    walk(program, &mut collector);
    collector.literals
}

/// Replace every numeric literal inside `draw` with `__constants[i]` and
/// return the literal values.
///
/// A source without a `sketch({ ... })` call, or whose `draw` is not a
/// function literal, comes back unchanged with no constants.
pub fn pull_out_constants(source: &str) -> Result<Extracted, SketchError> {
    let program = parse_program(source)?;
    let Some(draw) = draw_prop(&program)? else {
        return Ok(Extracted::unchanged(source));
    };
    let Some(func) = draw_function(draw) else {
        log::debug!("`draw` is not a function literal, no constants extracted");
        return Ok(Extracted::unchanged(source));
    };

    let (param, params_edit) = constants_param(func, source)?;
    let literals = collect_literals(&program, draw, param);

    let mut edits: Vec<(Span, String)> = params_edit.into_iter().collect();
    let mut constants = Vec::with_capacity(literals.len());
    for (i, (span, value)) in literals.into_iter().enumerate() {
        let reference = Expr::synthetic(ExprKind::Index {
            object: Box::new(Expr::synthetic(ExprKind::Ident(param))),
            index: Box::new(Expr::synthetic(ExprKind::Number(i as f64))),
        });
        edits.push((span, emitter::print(&reference, source)));
        constants.push(value);
    }

    Ok(Extracted {
        code: emitter::splice(source, edits),
        constants,
    })
}

/// Write `constants` back over the literals inside `draw`, rounded to
/// [`DEFAULT_PRECISION`] decimals.
pub fn replace_constants(source: &str, constants: &[f64]) -> Result<String, SketchError> {
    replace_constants_with_precision(source, constants, DEFAULT_PRECISION)
}

/// Like [`replace_constants`] with an explicit number of decimals.
///
/// Operates on the user's source, not on extracted code. Literals past the
/// end of `constants` and non-finite values are left as written.
pub fn replace_constants_with_precision(
    source: &str,
    constants: &[f64],
    precision: u32,
) -> Result<String, SketchError> {
    let program = parse_program(source)?;
    let Some(draw) = draw_prop(&program)? else {
        return Ok(source.to_string());
    };
    let Some(func) = draw_function(draw) else {
        return Ok(source.to_string());
    };
    let (param, _) = constants_param(func, source)?;

    let edits = collect_literals(&program, draw, param)
        .into_iter()
        .zip(constants)
        .filter(|(_, value)| value.is_finite())
        .map(|((span, _), &value)| (span, literal_text(source, span.start, round_to(value, precision))))
        .collect();
    Ok(emitter::splice(source, edits))
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    (value * factor).round() / factor
}

/// Source text for a number written at `offset`. Negative values after a
/// sign are parenthesized so `a - 5` never becomes `a --3`.
fn literal_text(source: &str, offset: usize, value: f64) -> String {
    let text = format_number(value);
    let after_sign = source[..offset].trim_end().ends_with(['-', '+']);
    if value < 0.0 && after_sign {
        format!("({text})")
    } else {
        text
    }
}

/// The number literal covering the 1-based `(line, column)`.
pub fn number_at(source: &str, line: u32, column: u32) -> Option<f64> {
    number_token_at(source, line, column).map(|(_, value)| value)
}

/// Replace the numeric token covering the 1-based `(line, column)` with
/// `value`. `None` when no number sits there.
pub fn replace_number_at(source: &str, line: u32, column: u32, value: f64) -> Option<String> {
    let (span, _) = number_token_at(source, line, column)?;
    let text = literal_text(source, span.start, value);
    Some(emitter::splice(source, vec![(span, text)]))
}

fn number_token_at(source: &str, line: u32, column: u32) -> Option<(Span, f64)> {
    let tokens = tokenize(source).ok()?;
    tokens.iter().find_map(|t| {
        let TokenKind::Number(value) = &t.kind else {
            return None;
        };
        let width = t.span.text(source).chars().count() as u32;
        (t.span.line == line && (t.span.column..t.span.column + width).contains(&column))
            .then_some((t.span, *value))
    })
}

// ─── Meta annotation ─────────────────────────────────────────────────────

struct MetaAnnotator<'c> {
    commands: &'c dyn CommandVocabulary,
}

impl<'a> Visitor<'a> for MetaAnnotator<'_> {
    fn stmt(&mut self, stmt: &'a Stmt, _ancestors: &[NodeRef<'a>]) -> Visit<Infallible> {
        match &stmt.kind {
            StmtKind::Expr(e) if !is_registration_call(e) => Visit::Skip,
            _ => Visit::Continue,
        }
    }

    fn prop(&mut self, prop: &'a Prop, _ancestors: &[NodeRef<'a>]) -> Visit<Infallible> {
        match prop.key() {
            Some(key) if key.as_str() != "draw" => Visit::Skip,
            _ => Visit::Continue,
        }
    }

    fn expr(&mut self, expr: &'a Expr, ancestors: &[NodeRef<'a>]) -> Visit {
        let ExprKind::Array(items) = &expr.kind else {
            return Visit::Continue;
        };
        let Some(name) = items.first().and_then(Expr::as_str_literal) else {
            return Visit::Continue;
        };
        if !self.commands.is_command(name) {
            return Visit::Continue;
        }
        let Some(Expr {
            kind: ExprKind::Object(props),
            ..
        }) = items.get(1)
        else {
            return Visit::Skip;
        };
        if props
            .iter()
            .any(|p| p.key().is_some_and(|k| k.as_str() == META_KEY))
        {
            return Visit::Skip;
        }

        let (line_start, line_end) = attributed_lines(expr, ancestors);
        let mut tuple = expr.clone();
        if let ExprKind::Array(items) = &mut tuple.kind {
            if let Some(Expr {
                kind: ExprKind::Object(props),
                ..
            }) = items.get_mut(1)
            {
                props.push(meta_prop(line_start, line_end));
            }
        }
        Visit::Replace(tuple)
    }
}

/// Lines of the element of the nearest enclosing array literal that holds
/// `tuple`: the tuple itself, or e.g. the spread that generates it.
fn attributed_lines(tuple: &Expr, ancestors: &[NodeRef<'_>]) -> (u32, u32) {
    let mut child = tuple.span;
    for node in ancestors.iter().rev() {
        if let NodeRef::Expr(Expr {
            kind: ExprKind::Array(_),
            ..
        }) = node
        {
            return (child.line, child.end_line);
        }
        child = node.span();
    }
    (tuple.span.line, tuple.span.end_line)
}

fn meta_prop(line_start: u32, line_end: u32) -> Prop {
    let number = |n: u32| Expr::synthetic(ExprKind::Number(f64::from(n)));
    Prop::synthetic(
        Name::intern(META_KEY),
        Expr::synthetic(ExprKind::Object(vec![
            Prop::synthetic(Name::intern("lineStart"), number(line_start)),
            Prop::synthetic(Name::intern("lineEnd"), number(line_end)),
        ])),
    )
}

/// Append `__meta: { lineStart, lineEnd }` to the argument object of every
/// command tuple reachable from the registration call's `draw`.
pub fn add_meta(source: &str, commands: &dyn CommandVocabulary) -> Result<String, SketchError> {
    let program = parse_program(source)?;
    let replacements = walk(&program, &mut MetaAnnotator { commands });
    log::trace!("annotated {} command tuples", replacements.len());
    Ok(emitter::apply(source, &replacements))
}

// ─── Module requires ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RequireSite {
    name: Name,
    module: String,
    span: Span,
}

/// `const name = require("module");`, the only accepted shape.
fn require_site(stmt: &Stmt) -> Option<RequireSite> {
    let StmtKind::Decl { decls, .. } = &stmt.kind else {
        return None;
    };
    let [decl] = decls.as_slice() else {
        return None;
    };
    let name = decl.target.as_ident()?;
    let Some(Expr {
        kind: ExprKind::Call { callee, args },
        ..
    }) = &decl.init
    else {
        return None;
    };
    if callee.as_ident()?.as_str() != "require" {
        return None;
    }
    let [arg] = args.as_slice() else {
        return None;
    };
    Some(RequireSite {
        name,
        module: arg.as_str_literal()?.to_string(),
        span: stmt.span,
    })
}

#[derive(Default)]
struct RequireCollector {
    sites: Vec<RequireSite>,
    error: Option<SketchError>,
}

impl<'a> Visitor<'a> for RequireCollector {
    fn stmt(&mut self, stmt: &'a Stmt, _ancestors: &[NodeRef<'a>]) -> Visit<Infallible> {
        match require_site(stmt) {
            Some(site) => {
                self.sites.push(site);
                Visit::Skip
            }
            None => Visit::Continue,
        }
    }

    fn expr(&mut self, expr: &'a Expr, _ancestors: &[NodeRef<'a>]) -> Visit {
        if self.error.is_none() && expr.as_ident().is_some_and(|n| n.as_str() == "require") {
            self.error = Some(SketchError::transform(
                "`require` is only supported as `const name = require(\"module\");`",
                expr.span,
            ));
        }
        Visit::Continue
    }
}

/// Turn `const name = require("module");` statements into nested deferred
/// callbacks around the rest of the program.
///
/// Each require statement is blanked in place (newlines kept), the openers
/// go in front of line 1 and the closers on a new last line, so every user
/// line keeps its number.
pub fn process_require(source: &str) -> Result<String, SketchError> {
    let program = parse_program(source)?;
    let mut collector = RequireCollector::default();
    walk(&program, &mut collector);
    if let Some(err) = collector.error {
        return Err(err);
    }
    if collector.sites.is_empty() {
        return Ok(source.to_string());
    }

    let blanks = collector
        .sites
        .iter()
        .map(|site| {
            let blank = site
                .span
                .text(source)
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect();
            (site.span, blank)
        })
        .collect();
    let body = emitter::splice(source, blanks);

    let mut out = String::with_capacity(body.len() + 64);
    for site in &collector.sites {
        let module = serde_json::to_string(&site.module).unwrap_or_else(|_| format!("\"{}\"", site.module));
        out.push_str(&format!("{REQUIRE_GLOBAL}({module}).then({} => {{ ", site.name.as_str()));
    }
    out.push_str(&body);
    out.push('\n');
    out.push_str(&vec!["});"; collector.sites.len()].join(" "));
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::BuiltinCommands;
    use pretty_assertions::assert_eq;

    const RECT: &str = r##"sketch({
  initialState: { x: 0 },
  draw: s => [
    ["background", { fill: "#fff" }],
    ["rect", { pos: [s.x + 10, 20.5], size: [30, 40] }],
  ],
});"##;

    #[test]
    fn pulls_literals_in_document_order() {
        let out = pull_out_constants(RECT).unwrap();
        assert_eq!(out.constants, vec![10.0, 20.5, 30.0, 40.0]);
        assert!(out.code.contains("draw: (s, __constants) =>"));
        assert!(out.code.contains("pos: [s.x + __constants[0], __constants[1]]"));
        assert!(out.code.contains("size: [__constants[2], __constants[3]]"));
        assert!(out.code.contains("initialState: { x: 0 }"));
        assert_eq!(out.code.lines().count(), RECT.lines().count());
    }

    #[test]
    fn pulling_twice_finds_nothing_new() {
        let once = pull_out_constants(RECT).unwrap();
        let twice = pull_out_constants(&once.code).unwrap();
        assert!(twice.constants.is_empty());
        assert_eq!(twice.code, once.code);
    }

    #[test]
    fn draw_without_params_gets_placeholder() {
        let src = "sketch({ draw: () => [[\"rect\", { pos: [1, 2] }]] });";
        let out = pull_out_constants(src).unwrap();
        assert!(out.code.contains("draw: (_, __constants) =>"));
        assert_eq!(out.constants, vec![1.0, 2.0]);
    }

    #[test]
    fn existing_second_param_is_reused() {
        let src = "sketch({ draw: (s, k) => [[\"rect\", { pos: [k[0], 7] }]] });";
        let out = pull_out_constants(src).unwrap();
        assert_eq!(out.constants, vec![7.0]);
        assert!(out.code.contains("pos: [k[0], k[0]]"));
    }

    #[test]
    fn literals_outside_draw_are_untouched() {
        let src = "const n = 5;\nsketch({ update: s => s + 1, draw: s => [] });";
        let out = pull_out_constants(src).unwrap();
        assert!(out.constants.is_empty());
        assert!(out.code.starts_with("const n = 5;"));
        assert!(out.code.contains("update: s => s + 1"));
    }

    #[test]
    fn missing_draw_is_a_transform_error() {
        let err = pull_out_constants("sketch({ initialState: {} });").unwrap_err();
        assert_eq!(err.kind(), "transform error");
        assert_eq!(err.position(), (1, 1));
    }

    #[test]
    fn no_registration_is_left_alone() {
        let src = "const a = 1;";
        assert_eq!(pull_out_constants(src).unwrap(), Extracted::unchanged(src));
    }

    #[test]
    fn replace_rewrites_the_same_literals() {
        let out = replace_constants(RECT, &[11.0, -2.25, 30.12345, 40.0]).unwrap();
        assert!(out.contains("pos: [s.x + 11, -2.25]"));
        assert!(out.contains("size: [30.123, 40]"));
        let again = pull_out_constants(&out).unwrap();
        // `-2.25` reads back as negation applied to the literal 2.25.
        assert_eq!(again.constants, vec![11.0, 2.25, 30.123, 40.0]);
    }

    #[test]
    fn replace_keeps_literals_past_the_vector() {
        let out = replace_constants(RECT, &[1.0]).unwrap();
        assert!(out.contains("pos: [s.x + 1, 20.5], size: [30, 40]"));
    }

    #[test]
    fn negative_after_sign_is_parenthesized() {
        let src = "sketch({ draw: s => [[\"rect\", { pos: [s.x - 5, 0] }]] });";
        let out = replace_constants(src, &[-3.0, 1.0]).unwrap();
        assert!(out.contains("pos: [s.x - (-3), 1]"));
    }

    #[test]
    fn single_line_tuple_meta() {
        let out = add_meta(RECT, &BuiltinCommands).unwrap();
        assert!(out.contains(r##"["background", { fill: "#fff", __meta: { lineStart: 4, lineEnd: 4 } }]"##));
        assert!(out.contains("size: [30, 40], __meta: { lineStart: 5, lineEnd: 5 } }]"));
        assert_eq!(out.lines().count(), RECT.lines().count());
    }

    #[test]
    fn spread_tuples_share_the_spread_lines() {
        let src = r#"sketch({
  draw: s => [
    ...s.dots.map(d => [
      "ellipse",
      { pos: d, size: [4, 4] },
    ]),
  ],
});"#;
        let out = add_meta(src, &BuiltinCommands).unwrap();
        assert!(out.contains("__meta: { lineStart: 3, lineEnd: 6 }"));
    }

    #[test]
    fn inner_tuple_takes_the_lines_of_its_spread() {
        let src = r#"sketch({
  draw: s => [
    ...s.dots.map(d =>
      ["rect", { pos: d, size: [4, 4] }]
    ),
  ],
});"#;
        let out = add_meta(src, &BuiltinCommands).unwrap();
        assert!(out.contains("__meta: { lineStart: 3, lineEnd: 5 }"), "{out}");
        assert!(!out.contains("lineStart: 4"));
        assert_eq!(out.lines().count(), src.lines().count());
    }

    #[test]
    fn tuple_without_object_or_unknown_command_is_skipped() {
        let src = "sketch({ draw: s => [[\"rect\", s.args], [\"blob\", {}]] });";
        assert_eq!(add_meta(src, &BuiltinCommands).unwrap(), src);
    }

    #[test]
    fn meta_only_inside_registration() {
        let src = "log([\"rect\", {}]);\nsketch({ draw: s => shapes });";
        assert_eq!(add_meta(src, &BuiltinCommands).unwrap(), src);
    }

    #[test]
    fn meta_is_not_added_twice() {
        let once = add_meta(RECT, &BuiltinCommands).unwrap();
        assert_eq!(add_meta(&once, &BuiltinCommands).unwrap(), once);
    }

    #[test]
    fn require_wraps_and_keeps_lines() {
        let src = "const utils = require(\"utils\");\nconst more = require('more');\nsketch({ draw: s => [] });";
        let out = process_require(src).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(
            "__require(\"utils\").then(utils => { __require(\"more\").then(more => { "
        ));
        assert_eq!(lines[1].trim(), "");
        assert_eq!(lines[2], "sketch({ draw: s => [] });");
        assert_eq!(lines[3], "}); });");
    }

    #[test]
    fn require_free_code_is_unchanged() {
        let src = "sketch({ draw: s => [] });";
        assert_eq!(process_require(src).unwrap(), src);
    }

    #[test]
    fn other_require_shapes_are_rejected() {
        for src in [
            "require(\"utils\");",
            "const { range } = require(\"utils\");",
            "const u = require(name);",
            "const f = require;",
        ] {
            let err = process_require(src).unwrap_err();
            assert_eq!(err.kind(), "transform error", "{src}");
        }
    }

    #[test]
    fn compile_runs_all_passes() {
        let src = format!("const utils = require(\"utils\");\n{RECT}");
        let out = compile(&src, &BuiltinCommands).unwrap();
        assert_eq!(out.constants, vec![10.0, 20.5, 30.0, 40.0]);
        assert!(out.code.starts_with("__require(\"utils\").then(utils => { "));
        assert!(out.code.contains("__meta: { lineStart: 6, lineEnd: 6 }"));
        assert!(parse_program(&out.code).is_ok());
    }

    #[test]
    fn number_picker_splice() {
        let src = "const a = 12;\nconst b = 3.5 + a;";
        assert_eq!(
            replace_number_at(src, 2, 12, 4.0).as_deref(),
            Some("const a = 12;\nconst b = 4 + a;")
        );
        assert_eq!(replace_number_at(src, 2, 1, 4.0), None);
        assert_eq!(number_at(src, 1, 11), Some(12.0));
        assert_eq!(number_at(src, 1, 13), None);
    }
}
