//! Reader lexer: converts guest source text to a token stream.
//!
//! - Brackets `()`, `[]`, `{}`
//! - Strings with `\n \t \r \0 \\ \"` escapes
//! - Integers (`i64`), floats, `:keywords`, symbols (dotted forms included)
//! - `;` line comments
//! - Reader macros (`'`, `` ` ``, `~`, `#`) are rejected
//! - Error recovery: keeps scanning after an error, up to
//!   [`vibe_types::MAX_ERRORS`]

use vibe_types::{ErrorCode, ParseError, ParseErrors, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// Characters that end an atom.
fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';')
}

pub struct Lexer<'src> {
    source: &'src str,
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line (1-based).
    line: u32,
    /// Current column in characters (1-based).
    col: u32,
    errors: ParseErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream, always ending with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: ParseErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: &source_file.source,
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: ParseErrors::empty(),
        }
    }

    /// Lex the whole source.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        while !self.errors.is_full() {
            let token = self.scan();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        self.errors
            .push(ParseError::new(code, message, span, source_line));
    }

    /// Skip whitespace and `;` comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────────

    fn scan(&mut self) -> Token {
        self.skip_trivia();
        let start_line = self.line;
        let start_col = self.col;
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '"' => return self.scan_string(start_line, start_col),
            ':' => return self.scan_keyword(start_line, start_col),
            '\'' | '`' | '~' | '#' => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("Reader macro '{ch}' is not supported"),
                    span,
                );
                return self.scan();
            }
            _ => {
                let start = self.pos - ch.len_utf8();
                return self.scan_atom(start, start_line, start_col);
            }
        };
        Token::new(kind, self.span_from(start_line, start_col))
    }

    /// Consume characters up to the next delimiter; returns the text.
    fn take_atom_text(&mut self, start: usize) -> &'src str {
        while let Some(ch) = self.peek() {
            if is_delimiter(ch) {
                break;
            }
            self.advance();
        }
        &self.source[start..self.pos]
    }

    fn scan_keyword(&mut self, start_line: u32, start_col: u32) -> Token {
        let start = self.pos;
        let name = self.take_atom_text(start);
        let span = self.span_from(start_line, start_col);
        if name.is_empty() {
            self.emit_error(ErrorCode::EMPTY_KEYWORD, "Keyword needs a name after ':'", span);
            return self.scan();
        }
        Token::new(TokenKind::Keyword(name.to_string()), span)
    }

    fn scan_atom(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        let text = self.take_atom_text(start);
        let span = self.span_from(start_line, start_col);
        if !looks_numeric(text) {
            return Token::new(TokenKind::Symbol(text.to_string()), span);
        }
        let digits = text.replace('_', "");
        if let Ok(n) = digits.parse::<i64>() {
            return Token::new(TokenKind::Integer(n), span);
        }
        if is_integer_literal(&digits) {
            self.emit_error(
                ErrorCode::INTEGER_OVERFLOW,
                format!("Integer literal '{text}' does not fit in 64 bits"),
                span,
            );
            return self.scan();
        }
        match digits.parse::<f64>() {
            Ok(x) => Token::new(TokenKind::Float(x), span),
            // `1abc`, `1.2.3`: not a number, read it as a symbol like Hy does
            Err(_) => Token::new(TokenKind::Symbol(text.to_string()), span),
        }
    }

    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut value = String::new();
        loop {
            let Some(ch) = self.advance() else {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "Premature end of input while reading a string literal",
                    span,
                );
                return Token::new(TokenKind::Eof, self.current_span());
            };
            match ch {
                '"' => break,
                '\\' => {
                    let esc_line = self.line;
                    let esc_col = self.col - 1;
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('0') => value.push('\0'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('\n') => {}
                        Some(other) => {
                            let span = self.span_from(esc_line, esc_col);
                            self.emit_error(
                                ErrorCode::INVALID_ESCAPE,
                                format!("Invalid escape sequence '\\{other}'"),
                                span,
                            );
                        }
                        None => continue,
                    }
                }
                other => value.push(other),
            }
        }
        Token::new(TokenKind::Str(value), self.span_from(start_line, start_col))
    }
}

/// Whether an atom should be tried as a number: a digit, or a sign or dot
/// followed by a digit. Keeps `inf`, `nan`, `-` and `+` as symbols.
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-' | '.') => match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        },
        _ => false,
    }
}

fn is_integer_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_digit())
}
