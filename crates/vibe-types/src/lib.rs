//! Shared types for vibekernel.
//!
//! This crate defines the source spans, syntax error types and the reader's
//! [`Form`] tree used by the lexer, parser, evaluator and kernel.

mod error;
mod form;
mod span;

pub use error::{ErrorCode, ParseError, ParseErrors, MAX_ERRORS};
pub use form::{Form, FormKind};
pub use span::{SourceFile, Span};
