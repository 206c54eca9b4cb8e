use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of errors collected before the reader gives up.
pub const MAX_ERRORS: usize = 20;

/// Numeric reader error code (E100–E199).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const UNEXPECTED_CHARACTER: Self = Self(100);
    pub const UNEXPECTED_CLOSER: Self = Self(101);
    pub const MISMATCHED_CLOSER: Self = Self(102);
    pub const PREMATURE_EOF: Self = Self(103);
    pub const UNTERMINATED_STRING: Self = Self(104);
    pub const INVALID_ESCAPE: Self = Self(105);
    pub const ODD_DICT_LITERAL: Self = Self(106);
    pub const EMPTY_KEYWORD: Self = Self(107);
    pub const NESTING_TOO_DEEP: Self = Self(108);
    pub const INTEGER_OVERFLOW: Self = Self(109);

    /// Whether more input could turn the text into something readable.
    ///
    /// Drives `is_complete` answers: an open bracket or string is
    /// incomplete, anything else is invalid.
    pub fn is_incomplete(self) -> bool {
        self == Self::PREMATURE_EOF || self == Self::UNTERMINATED_STRING
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A syntax error raised while reading guest source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{span}: {message}")]
pub struct ParseError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the error points at.
    pub source_line: String,
}

impl ParseError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }

    pub fn is_incomplete(&self) -> bool {
        self.code.is_incomplete()
    }
}

/// Errors collected by one reader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseErrors {
    pub errors: Vec<ParseError>,
    pub total: usize,
}

impl ParseErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total > 0
    }

    /// Whether the collection reached [`MAX_ERRORS`].
    pub fn is_full(&self) -> bool {
        self.total >= MAX_ERRORS
    }

    /// Record an error; only the first [`MAX_ERRORS`] are kept.
    pub fn push(&mut self, error: ParseError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total += 1;
    }

    /// The first error in source order of discovery.
    pub fn first(&self) -> Option<&ParseError> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: ErrorCode) -> ParseError {
        ParseError::new(code, "boom", Span::point(1, 1), "(")
    }

    #[test]
    fn code_display() {
        assert_eq!(ErrorCode::PREMATURE_EOF.to_string(), "E103");
    }

    #[test]
    fn incomplete_codes() {
        assert!(ErrorCode::PREMATURE_EOF.is_incomplete());
        assert!(ErrorCode::UNTERMINATED_STRING.is_incomplete());
        assert!(!ErrorCode::UNEXPECTED_CLOSER.is_incomplete());
    }

    #[test]
    fn collection_is_capped() {
        let mut errors = ParseErrors::empty();
        for _ in 0..MAX_ERRORS + 5 {
            errors.push(error(ErrorCode::UNEXPECTED_CHARACTER));
        }
        assert_eq!(errors.errors.len(), MAX_ERRORS);
        assert_eq!(errors.total, MAX_ERRORS + 5);
        assert!(errors.is_full());
    }

    #[test]
    fn error_display_includes_position() {
        let err = ParseError::new(
            ErrorCode::UNEXPECTED_CLOSER,
            "Ran into a ')' where it wasn't expected.",
            Span::point(2, 5),
            "  )",
        );
        assert_eq!(err.to_string(), "2:5: Ran into a ')' where it wasn't expected.");
    }

    #[test]
    fn error_serializes_with_flat_span() {
        let json = serde_json::to_value(error(ErrorCode::PREMATURE_EOF)).unwrap();
        assert_eq!(json["code"], 103);
        assert_eq!(json["start_line"], 1);
        assert_eq!(json["message"], "boom");
    }
}
