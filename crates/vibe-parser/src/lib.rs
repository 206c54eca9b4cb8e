//! vibekernel parser: converts a token stream into top-level forms.

mod parse_form;
mod parser;

pub use parser::{ParseResult, Parser, MAX_NESTING};
