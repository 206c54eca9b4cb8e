//! Completion, inspection and completeness checks. All of these only read
//! session state.

use std::collections::BTreeSet;

use vibe_eval::methods::names_for;
use vibe_eval::value::Class;
use vibe_eval::{static_repr, Value, SPECIAL_FORMS};

use crate::reader;
use crate::reply::{CompleteReply, Completeness, InspectReply, IsCompleteReply};
use crate::session::Session;

/// Indent suggested for the next line of an unfinished form.
pub const CONTINUATION_INDENT: &str = "  ";

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\'')
}

/// Start of the word ending at `cursor` (both in chars).
fn word_start(chars: &[char], cursor: usize) -> usize {
    chars[..cursor]
        .iter()
        .rposition(|&c| is_delimiter(c))
        .map_or(0, |i| i + 1)
}

impl Session {
    /// Names that extend the word before `cursor_pos`.
    ///
    /// Cursor positions count characters, not bytes.
    pub fn complete(&self, code: &str, cursor_pos: usize) -> CompleteReply {
        let chars: Vec<char> = code.chars().collect();
        let cursor = cursor_pos.min(chars.len());
        let start = word_start(&chars, cursor);
        let word: String = chars[start..cursor].iter().collect();
        if word.is_empty() {
            return CompleteReply::new(Vec::new(), cursor, cursor);
        }

        let matches: BTreeSet<String> = match word.rsplit_once('.') {
            Some((owner, partial)) if !owner.is_empty() => match self.resolve(owner) {
                Some(value) => attribute_names(&value)
                    .into_iter()
                    .filter(|name| name.starts_with(partial))
                    .map(|name| format!("{owner}.{name}"))
                    .collect(),
                None => BTreeSet::new(),
            },
            _ => {
                let env = &self.evaluator.env;
                env.global_names()
                    .chain(SPECIAL_FORMS.iter().copied())
                    .filter(|name| name.starts_with(word.as_str()))
                    .map(str::to_string)
                    .collect()
            }
        };
        CompleteReply::new(matches.into_iter().collect(), start, cursor)
    }

    /// Describe the name under the cursor as `name: type = repr`.
    pub fn inspect(&self, code: &str, cursor_pos: usize, _detail_level: u8) -> InspectReply {
        let chars: Vec<char> = code.chars().collect();
        let cursor = cursor_pos.min(chars.len());
        let start = word_start(&chars, cursor);
        let end = chars[cursor..]
            .iter()
            .position(|&c| is_delimiter(c))
            .map_or(chars.len(), |i| cursor + i);
        let word: String = chars[start..end].iter().collect();

        match self.resolve(&word) {
            Some(value) => InspectReply::found(format!(
                "{word}: {} = {}",
                value.type_name(),
                static_repr(&value)
            )),
            None => InspectReply::not_found(),
        }
    }

    /// Whether `code` could be submitted as is.
    pub fn is_complete(&self, code: &str) -> IsCompleteReply {
        match reader::read_units(code) {
            Ok(_) => IsCompleteReply {
                status: Completeness::Complete,
                indent: None,
            },
            Err(failure) if failure.incomplete => IsCompleteReply {
                status: Completeness::Incomplete,
                indent: Some(CONTINUATION_INDENT.to_string()),
            },
            Err(_) => IsCompleteReply {
                status: Completeness::Invalid,
                indent: None,
            },
        }
    }

    /// Look up a plain or dotted name without evaluating anything.
    fn resolve(&self, name: &str) -> Option<Value> {
        if name.is_empty() {
            return None;
        }
        let mut parts = name.split('.');
        let head = parts.next()?;
        let mut value = match head {
            "None" => Value::None,
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            _ => self.evaluator.env.get(head)?.clone(),
        };
        for attr in parts {
            value = self.evaluator.get_attr(&value, attr).ok()?;
        }
        Some(value)
    }
}

fn class_attr_names(class: &Class, out: &mut BTreeSet<String>) {
    out.extend(class.attrs.borrow().keys().cloned());
    for base in &class.bases {
        class_attr_names(base, out);
    }
}

fn attribute_names(value: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    match value {
        Value::Module(module) => names.extend(module.attrs.keys().cloned()),
        Value::Instance(instance) => {
            names.extend(instance.fields.borrow().keys().cloned());
            class_attr_names(&instance.class, &mut names);
        }
        Value::Class(class) => class_attr_names(class, &mut names),
        other => names.extend(names_for(other).iter().map(|name| name.to_string())),
    }
    names
}
