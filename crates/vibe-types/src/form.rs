//! Reader forms: the evaluation units produced by the parser.
//!
//! Every form carries a [`Span`] so evaluation failures can point back at
//! the cell line that raised them.

use crate::Span;
use std::fmt;

/// One parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Integer(i64),
    Float(f64),
    Str(String),
    /// `:name`, stored without the colon.
    Keyword(String),
    /// Any bare identifier, including dotted `obj.attr` and `.method`.
    Symbol(String),
    /// `( ... )`
    Expression(Vec<Form>),
    /// `[ ... ]`
    List(Vec<Form>),
    /// `{ k v ... }`, flattened key/value sequence of even length.
    Dict(Vec<Form>),
}

impl Form {
    pub fn new(kind: FormKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Short human name for the kind of form, used in syntax messages.
    pub fn describe(&self) -> &'static str {
        match self.kind {
            FormKind::Integer(_) => "integer",
            FormKind::Float(_) => "float",
            FormKind::Str(_) => "string",
            FormKind::Keyword(_) => "keyword",
            FormKind::Symbol(_) => "symbol",
            FormKind::Expression(_) => "expression",
            FormKind::List(_) => "list",
            FormKind::Dict(_) => "dict",
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Form], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

/// Prints the form back as source text.
impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FormKind::Integer(n) => write!(f, "{n}"),
            FormKind::Float(x) => write!(f, "{x:?}"),
            FormKind::Str(s) => write!(f, "{s:?}"),
            FormKind::Keyword(k) => write!(f, ":{k}"),
            FormKind::Symbol(s) => f.write_str(s),
            FormKind::Expression(items) => write_seq(f, "(", items, ")"),
            FormKind::List(items) => write_seq(f, "[", items, "]"),
            FormKind::Dict(items) => write_seq(f, "{", items, "}"),
        }
    }
}
