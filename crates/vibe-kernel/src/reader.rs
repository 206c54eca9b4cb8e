//! Text to evaluation units.

use vibe_lexer::Lexer;
use vibe_parser::Parser;
use vibe_types::{Form, SourceFile};

/// Name under which submissions are parsed.
pub const INPUT_NAME: &str = "<input>";

/// Why a submission could not be split into units.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxFailure {
    pub message: String,
    /// 1-based line of the offending text.
    pub line: u32,
    /// The text ended inside an unfinished form.
    pub incomplete: bool,
}

/// Parse `text` into its top-level forms, in source order.
///
/// All-or-nothing: any syntax error fails the whole submission with the
/// first error found, so no unit runs from a cell that does not parse.
pub fn read_units(text: &str) -> Result<Vec<Form>, SyntaxFailure> {
    let source = SourceFile::new(INPUT_NAME, text);
    let lexed = Lexer::new(&source).lex();
    let parsed = Parser::new(lexed.tokens, &source).parse();
    let first = lexed
        .errors
        .first()
        .into_iter()
        .chain(parsed.errors.first())
        .min_by_key(|e| (e.span.start_line, e.span.start_col));
    match first {
        Some(err) => Err(SyntaxFailure {
            message: err.message.clone(),
            line: err.span.start_line,
            incomplete: err.is_incomplete(),
        }),
        None => Ok(parsed.forms),
    }
}
