//! Tokenizer for the sketch language.
//!
//! Built on `winnow` 0.7 over a `&mut &str` cursor. Handles line and block
//! comments, numbers (fraction and exponent), single/double-quoted strings
//! with escapes, identifiers/keywords, and operators (longest match first).

use crate::error::{SketchError, Span};
use crate::name::Name;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, take_till, take_while};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(Name),
    Keyword(&'static str),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

const KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "return", "if", "else", "for", "while", "break",
    "continue", "true", "false", "null", "undefined", "typeof",
];

/// Ordered longest-first so that `===` wins over `==` and `=`.
const PUNCTS: &[&str] = &[
    "===", "!==", "**=", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=",
    "-=", "*=", "/=", "%=", "**", "+", "-", "*", "/", "%", "=", "<", ">", "!", "?", ":", ".",
    ",", ";", "(", ")", "[", "]", "{", "}",
];

// ─── Line index ──────────────────────────────────────────────────────────

/// Byte offsets of every line start, for offset → line/column lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// 1-based `(line, column)` of a byte offset. Columns count chars.
    pub fn locate(&self, source: &str, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&s| s <= offset).max(1);
        let start = self.starts[line - 1];
        let column = source[start..offset.min(source.len())].chars().count() + 1;
        (line as u32, column as u32)
    }

    pub fn span(&self, source: &str, start: usize, end: usize) -> Span {
        let (line, column) = self.locate(source, start);
        let (end_line, _) = self.locate(source, end.saturating_sub(1).max(start));
        Span {
            start,
            end,
            line,
            column,
            end_line,
        }
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────────

/// Split source text into tokens, ending with a single `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SketchError> {
    let lines = LineIndex::new(source);
    let mut rest = source;
    let mut tokens = Vec::new();

    loop {
        let trivia_start = source.len() - rest.len();
        let newline_before = match skip_trivia(&mut rest) {
            Some(newline) => newline,
            None => {
                let span = lines.span(source, trivia_start, trivia_start + 2);
                return Err(SketchError::parse("unterminated block comment", span));
            }
        };

        let start = source.len() - rest.len();
        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: lines.span(source, start, start),
                newline_before,
            });
            return Ok(tokens);
        }

        let first = rest.chars().next().unwrap_or_default();
        let kind = lex_token(&mut rest).map_err(|_| {
            let end = start + first.len_utf8();
            let message = match first {
                '"' | '\'' => "unterminated string literal".to_string(),
                '`' => "template literals are not supported".to_string(),
                c => format!("unexpected character `{c}`"),
            };
            SketchError::parse(message, lines.span(source, start, end))
        })?;

        let end = source.len() - rest.len();
        tokens.push(Token {
            kind,
            span: lines.span(source, start, end),
            newline_before,
        });
    }
}

/// Skip whitespace and comments. Returns whether a newline was crossed,
/// or `None` for an unterminated block comment.
fn skip_trivia(input: &mut &str) -> Option<bool> {
    let mut newline = false;
    loop {
        let before = *input;
        let trimmed = input.trim_start();
        newline |= input[..input.len() - trimmed.len()].contains('\n');
        *input = trimmed;

        if input.starts_with("//") {
            match input.find('\n') {
                Some(pos) => *input = &input[pos..],
                None => *input = "",
            }
            continue;
        }
        if input.starts_with("/*") {
            let end = input[2..].find("*/")?;
            newline |= input[..end + 2].contains('\n');
            *input = &input[end + 4..];
            continue;
        }
        if *input == before {
            return Some(newline);
        }
    }
}

fn lex_token(input: &mut &str) -> ModalResult<TokenKind> {
    let mut chars = input.chars();
    let first = chars.next().unwrap_or_default();
    let second = chars.next().unwrap_or_default();

    if first.is_ascii_digit() || (first == '.' && second.is_ascii_digit()) {
        return lex_number.map(TokenKind::Number).parse_next(input);
    }
    if first == '"' || first == '\'' {
        return lex_string.map(TokenKind::Str).parse_next(input);
    }
    if is_ident_start(first) {
        return lex_word.parse_next(input);
    }
    lex_punct.parse_next(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn lex_number(input: &mut &str) -> ModalResult<f64> {
    let start = *input;
    let _ = take_while::<_, _, ContextError>(0.., |c: char| c.is_ascii_digit()).parse_next(input);
    if input.starts_with('.') {
        *input = &input[1..];
        let _ =
            take_while::<_, _, ContextError>(0.., |c: char| c.is_ascii_digit()).parse_next(input);
    }
    if input.starts_with(['e', 'E']) {
        let checkpoint = *input;
        *input = &input[1..];
        if input.starts_with(['+', '-']) {
            *input = &input[1..];
        }
        let digits =
            take_while::<_, _, ContextError>(1.., |c: char| c.is_ascii_digit()).parse_next(input);
        if digits.is_err() {
            *input = checkpoint;
        }
    }
    let matched = &start[..start.len() - input.len()];
    matched
        .parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

fn lex_string(input: &mut &str) -> ModalResult<String> {
    let quote: char = any.parse_next(input)?;
    let mut out = String::new();
    loop {
        let chunk: &str =
            take_till(0.., |c: char| c == quote || c == '\\' || c == '\n').parse_next(input)?;
        out.push_str(chunk);
        let next: char = any.parse_next(input)?;
        if next == quote {
            return Ok(out);
        }
        if next != '\\' {
            // Raw newline inside a string literal.
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        let escaped: char = any.parse_next(input)?;
        out.push(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        });
    }
}

fn lex_word(input: &mut &str) -> ModalResult<TokenKind> {
    let word: &str = take_while(1.., is_ident_continue).parse_next(input)?;
    Ok(match KEYWORDS.iter().find(|k| **k == word) {
        Some(keyword) => TokenKind::Keyword(keyword),
        None => TokenKind::Ident(Name::intern(word)),
    })
}

fn lex_punct(input: &mut &str) -> ModalResult<TokenKind> {
    for punct in PUNCTS {
        if input.starts_with(punct) {
            *input = &input[punct.len()..];
            return Ok(TokenKind::Punct(punct));
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_numbers_strings_and_operators() {
        let toks = kinds(r#"x = 1.5e2 + 'a\'b' === "c""#);
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident(Name::intern("x")),
                TokenKind::Punct("="),
                TokenKind::Number(150.0),
                TokenKind::Punct("+"),
                TokenKind::Str("a'b".into()),
                TokenKind::Punct("==="),
                TokenKind::Str("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments_and_tracks_newlines() {
        let toks = tokenize("a // one\n/* two\n */ b").unwrap();
        assert_eq!(toks.len(), 3);
        assert!(!toks[0].newline_before);
        assert!(toks[1].newline_before);
        assert_eq!(toks[1].span.line, 3);
        assert_eq!(toks[1].span.column, 5);
    }

    #[test]
    fn spread_and_arrow_are_single_tokens() {
        let toks = kinds("...xs => .5");
        assert_eq!(toks[0], TokenKind::Punct("..."));
        assert_eq!(toks[2], TokenKind::Punct("=>"));
        assert_eq!(toks[3], TokenKind::Number(0.5));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = tokenize("a = \"oops\nb").unwrap_err();
        assert_eq!(err.position(), (1, 5));
        assert!(err.message().contains("unterminated"));
    }

    #[test]
    fn multiline_span_records_end_line() {
        let lines = LineIndex::new("ab\ncd\nef");
        let span = lines.span("ab\ncd\nef", 1, 7);
        assert_eq!((span.line, span.end_line), (1, 3));
    }
}
