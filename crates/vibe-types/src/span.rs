use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span.
///
/// Lines and columns are 1-based; columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A zero-width span at one position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Span running from the start of `self` to the end of `end`.
    ///
    /// Used to cover a bracketed form from its opener to its closer.
    pub fn to(self, end: Span) -> Span {
        Span::new(self.start_line, self.start_col, end.end_line, end.end_col)
    }

    /// Number of lines the span touches.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A named block of source text, e.g. one notebook cell.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// The text of a 1-based line, without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Same text under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: self.source.clone(),
            line_starts: self.line_starts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_to_covers_both_ends() {
        let open = Span::new(1, 1, 1, 1);
        let close = Span::new(3, 4, 3, 4);
        let span = open.to(close);
        assert_eq!(span, Span::new(1, 1, 3, 4));
        assert_eq!(span.line_count(), 3);
    }

    #[test]
    fn span_display_is_start_position() {
        assert_eq!(Span::new(2, 7, 2, 9).to_string(), "2:7");
    }

    #[test]
    fn lines_are_extracted_without_terminators() {
        let src = SourceFile::new("<cell-1>", "(setv x 1)\r\n(print x)\n");
        assert_eq!(src.line(1), Some("(setv x 1)"));
        assert_eq!(src.line(2), Some("(print x)"));
        assert_eq!(src.line(3), Some(""));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
    }

    #[test]
    fn empty_source_has_one_empty_line() {
        let src = SourceFile::new("<input>", "");
        assert_eq!(src.line_count(), 1);
        assert_eq!(src.line(1), Some(""));
    }

    #[test]
    fn renamed_keeps_text() {
        let src = SourceFile::new("<input>", "a\nb").renamed("<cell-4>");
        assert_eq!(src.name, "<cell-4>");
        assert_eq!(src.line(2), Some("b"));
    }
}
