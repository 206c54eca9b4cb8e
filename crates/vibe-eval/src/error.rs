//! Runtime error types for the evaluator.

use thiserror::Error;

/// Evaluation failure raised by guest code.
///
/// Each variant maps onto the exception class name a notebook user would
/// expect to see, via [`EvalError::kind`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Unbound identifier.
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    /// Wrong operand or argument type, wrong arity, non-callable callee.
    #[error("{0}")]
    Type(String),
    /// Right type, unacceptable value (`(int "abc")`).
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    ZeroDivision(String),
    #[error("{0}")]
    Index(String),
    /// Missing dict key; the message is the key's repr.
    #[error("{0}")]
    Key(String),
    #[error("{0}")]
    Attribute(String),
    /// `(assert ...)` failure; the message may be empty.
    #[error("{0}")]
    Assertion(String),
    /// Malformed special form, found while evaluating it.
    #[error("{0}")]
    Syntax(String),
    /// Checked integer arithmetic overflowed.
    #[error("{0}")]
    Overflow(String),
    /// A result too large to build (`(* [0] 10000000000)`).
    #[error("{0}")]
    Memory(String),
    /// Call depth limit reached.
    #[error("maximum recursion depth exceeded")]
    Recursion,
    /// `(raise ...)` of an exception value.
    #[error("{message}")]
    Raised { kind: String, message: String },
    /// Writing to an output stream failed.
    #[error("{0}")]
    Os(String),
}

impl EvalError {
    /// The exception class name reported to the front end.
    pub fn kind(&self) -> &str {
        match self {
            Self::UndefinedName(_) => "NameError",
            Self::Type(_) => "TypeError",
            Self::Value(_) => "ValueError",
            Self::ZeroDivision(_) => "ZeroDivisionError",
            Self::Index(_) => "IndexError",
            Self::Key(_) => "KeyError",
            Self::Attribute(_) => "AttributeError",
            Self::Assertion(_) => "AssertionError",
            Self::Syntax(_) => "SyntaxError",
            Self::Overflow(_) => "OverflowError",
            Self::Memory(_) => "MemoryError",
            Self::Recursion => "RecursionError",
            Self::Raised { kind, .. } => kind,
            Self::Os(_) => "OSError",
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
