//! Turns a cell's final value into a mime bundle.

use std::collections::BTreeMap;

use vibe_eval::{Evaluator, Value};

/// Rich display hooks, in priority order, with the mime type each yields.
pub const DISPLAY_HOOKS: &[(&str, &str)] = &[
    ("_repr_html_", "text/html"),
    ("_repr_markdown_", "text/markdown"),
    ("_repr_latex_", "text/latex"),
];

pub const TEXT_PLAIN: &str = "text/plain";

/// Build the representations of `value`.
///
/// Always yields `text/plain`. A class instance may add one rich entry
/// from the first display hook it defines that returns a string. Nothing
/// here fails: hooks that raise or return non-strings are skipped, and a
/// failing `__repr__` falls back to the placeholder.
pub fn present(ev: &mut Evaluator, value: &Value) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert(TEXT_PLAIN.to_string(), plain_text(ev, value));
    if let Some((mime, text)) = rich_text(ev, value) {
        data.insert(mime.to_string(), text);
    }
    data
}

fn plain_text(ev: &mut Evaluator, value: &Value) -> String {
    if let Value::Instance(instance) = value {
        if instance.class.lookup("__repr__").is_none() {
            return value.placeholder();
        }
    } else if value.is_opaque() {
        return value.placeholder();
    }
    ev.repr(value).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "repr failed; using placeholder");
        value.placeholder()
    })
}

fn rich_text(ev: &mut Evaluator, value: &Value) -> Option<(&'static str, String)> {
    let Value::Instance(instance) = value else {
        return None;
    };
    DISPLAY_HOOKS.iter().find_map(|&(hook, mime)| {
        let method = instance.class.lookup(hook)?;
        let Value::Function(_) = method else {
            return None;
        };
        let bound = ev.get_attr(value, hook).ok()?;
        match ev.call_value(&bound, Default::default()) {
            Ok(Value::Str(text)) => Some((mime, text)),
            Ok(other) => {
                tracing::debug!(hook, returned = %other.type_name(), "display hook returned non-string");
                None
            }
            Err(err) => {
                tracing::debug!(hook, error = %err, "display hook failed");
                None
            }
        }
    })
}
