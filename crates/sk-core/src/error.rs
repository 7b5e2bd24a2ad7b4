//! Error taxonomy shared by the transformer and the evaluator.
//!
//! Every variant carries enough position information to annotate the
//! editor gutter. Lines and columns are 1-based, like the `__meta` ranges.

use thiserror::Error;

/// A byte range in the source text plus the 1-based line/column of its start
/// and the 1-based line of its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
}

impl Span {
    /// Line 1, column 1, for errors with no better location.
    pub const ORIGIN: Span = Span {
        start: 0,
        end: 0,
        line: 1,
        column: 1,
        end_line: 1,
    };

    /// `self`, or [`Span::ORIGIN`] for a synthetic span with no position.
    pub fn or_origin(self) -> Span {
        if self.line == 0 { Span::ORIGIN } else { self }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            line: self.line,
            column: self.column,
            end_line: other.end_line,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice the source text covered by this span.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Anything that went wrong between source text and a live sketch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    /// Malformed source text.
    #[error("{line}:{column}: {message}")]
    Parse {
        message: String,
        line: u32,
        column: u32,
    },

    /// Well-formed source that violates a transformer assumption
    /// (no `draw`, an unsupported `require` form, ...).
    #[error("{line}:{column}: {message}")]
    Transform {
        message: String,
        line: u32,
        column: u32,
    },

    /// An exception raised while executing user code.
    #[error("{line}:{column}: {message}")]
    Evaluation {
        message: String,
        line: u32,
        column: u32,
    },
}

impl SketchError {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        let span = span.or_origin();
        Self::Parse {
            message: message.into(),
            line: span.line,
            column: span.column.max(1),
        }
    }

    pub fn transform(message: impl Into<String>, span: Span) -> Self {
        let span = span.or_origin();
        Self::Transform {
            message: message.into(),
            line: span.line,
            column: span.column.max(1),
        }
    }

    pub fn evaluation(message: impl Into<String>, span: Span) -> Self {
        let span = span.or_origin();
        Self::Evaluation {
            message: message.into(),
            line: span.line,
            column: span.column.max(1),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Parse { message, .. }
            | Self::Transform { message, .. }
            | Self::Evaluation { message, .. } => message,
        }
    }

    /// `(line, column)`, 1-based.
    pub fn position(&self) -> (u32, u32) {
        match self {
            Self::Parse { line, column, .. }
            | Self::Transform { line, column, .. }
            | Self::Evaluation { line, column, .. } => (*line, *column),
        }
    }

    /// Short label for the error class, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse error",
            Self::Transform { .. } => "transform error",
            Self::Evaluation { .. } => "evaluation error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let err = SketchError::Parse {
            message: "unexpected `}`".into(),
            line: 3,
            column: 7,
        };
        assert_eq!(err.to_string(), "3:7: unexpected `}`");
        assert_eq!(err.position(), (3, 7));
        assert_eq!(err.kind(), "parse error");
    }
}
