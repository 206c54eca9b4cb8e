//! Form parsing: atoms and bracketed sequences.

use vibe_lexer::token::{Token, TokenKind};
use vibe_types::{ErrorCode, Form, FormKind};

use crate::parser::{Parser, MAX_NESTING};

impl Parser<'_> {
    /// Parse one form. Returns `None` after reporting an error or at the
    /// end of input.
    pub(crate) fn parse_form(&mut self) -> Option<Form> {
        let token = self.advance()?;
        let kind = match token.kind {
            TokenKind::Integer(n) => FormKind::Integer(n),
            TokenKind::Float(x) => FormKind::Float(x),
            TokenKind::Str(s) => FormKind::Str(s),
            TokenKind::Keyword(k) => FormKind::Keyword(k),
            TokenKind::Symbol(s) => FormKind::Symbol(s),
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                return self.parse_sequence(token);
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.error(
                    ErrorCode::UNEXPECTED_CLOSER,
                    format!("Ran into a '{}' where it wasn't expected.", token.kind),
                    token.span,
                );
                return None;
            }
            TokenKind::Eof => return None,
        };
        Some(Form::new(kind, token.span))
    }

    /// Parse the body of `( ... )`, `[ ... ]` or `{ ... }` after its opener.
    fn parse_sequence(&mut self, open: Token) -> Option<Form> {
        if self.depth >= MAX_NESTING {
            self.error(
                ErrorCode::NESTING_TOO_DEEP,
                format!("Forms nested more than {MAX_NESTING} levels deep"),
                open.span,
            );
            return None;
        }
        let closer = open.kind.closer()?;
        self.depth += 1;

        let mut items = Vec::new();
        let end = loop {
            let next = self.peek_kind().clone();
            if next == closer {
                break self.advance()?.span;
            }
            if next == TokenKind::Eof {
                self.error(
                    ErrorCode::PREMATURE_EOF,
                    format!(
                        "Premature end of input while attempting to parse one form: '{}' opened at {} is never closed",
                        open.kind, open.span
                    ),
                    open.span,
                );
                return None;
            }
            if next.is_closer() {
                let span = self.current_span();
                self.error(
                    ErrorCode::MISMATCHED_CLOSER,
                    format!(
                        "Expected '{closer}' to close '{}' opened at {}, found '{next}'",
                        open.kind, open.span
                    ),
                    span,
                );
                return None;
            }
            items.push(self.parse_form()?);
        };
        self.depth -= 1;

        let span = open.span.to(end);
        let kind = match open.kind {
            TokenKind::LParen => FormKind::Expression(items),
            TokenKind::LBracket => FormKind::List(items),
            _ => {
                if items.len() % 2 != 0 {
                    self.error(
                        ErrorCode::ODD_DICT_LITERAL,
                        "Dict literal needs an even number of forms (key/value pairs)",
                        span,
                    );
                    return None;
                }
                FormKind::Dict(items)
            }
        };
        Some(Form::new(kind, span))
    }
}
