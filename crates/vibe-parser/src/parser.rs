//! Core parser infrastructure: token cursor, error reporting, entry point.

use vibe_lexer::token::{Token, TokenKind};
use vibe_types::{ErrorCode, Form, ParseError, ParseErrors, SourceFile, Span};

/// Deepest bracket nesting accepted before the parser bails out.
pub const MAX_NESTING: u32 = 256;

/// The reader parser.
///
/// Consumes the lexer's token stream and produces the top-level forms in
/// source order. Stops at the first structural error: an unbalanced
/// bracket leaves nothing sensible to recover to.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    errors: ParseErrors,
    /// Current bracket nesting depth.
    pub(crate) depth: u32,
}

/// Result of parsing.
pub struct ParseResult {
    /// Top-level forms read before the first error.
    pub forms: Vec<Form>,
    pub errors: ParseErrors,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: ParseErrors::empty(),
            depth: 0,
        }
    }

    /// Parse every top-level form.
    pub fn parse(mut self) -> ParseResult {
        let mut forms = Vec::new();
        while !self.at_end() {
            match self.parse_form() {
                Some(form) => forms.push(form),
                None => break,
            }
        }
        ParseResult {
            forms,
            errors: self.errors,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        self.peek().map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    /// Consume the current token. `None` only past the end of the stream.
    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(|| Span::point(1, 1))
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    pub(crate) fn error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        self.errors
            .push(ParseError::new(code, message, span, source_line));
    }
}
