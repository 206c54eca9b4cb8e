//! Native methods of the built-in container and string types.

use crate::builtins::sequence_index;
use crate::display::static_repr;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::ops::{sized, MAX_LIST_LEN, MAX_STR_LEN};
use crate::value::{Args, Dict, Value};

const LIST_METHODS: &[&str] = &[
    "append", "copy", "count", "extend", "index", "insert", "pop", "reverse",
];
const STR_METHODS: &[&str] = &[
    "endswith", "join", "lower", "replace", "split", "startswith", "strip", "upper",
];
const DICT_METHODS: &[&str] = &["copy", "get", "items", "keys", "pop", "update", "values"];

/// Method names available on `value`'s type.
pub fn names_for(value: &Value) -> &'static [&'static str] {
    match value {
        Value::List(_) => LIST_METHODS,
        Value::Str(_) => STR_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => &[],
    }
}

pub(crate) fn lookup(value: &Value, name: &str) -> Option<&'static str> {
    names_for(value).iter().copied().find(|m| *m == name)
}

pub(crate) fn call_native(
    ev: &mut Evaluator,
    receiver: &Value,
    name: &str,
    args: Args,
) -> EvalResult<Value> {
    match receiver {
        Value::List(_) => list_method(ev, receiver, name, args),
        Value::Str(s) => str_method(ev, s, name, args),
        Value::Dict(_) => dict_method(receiver, name, args),
        other => Err(EvalError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            other.type_name()
        ))),
    }
}

fn no_such_method(receiver: &Value, name: &str) -> EvalError {
    EvalError::Attribute(format!(
        "'{}' object has no attribute '{name}'",
        receiver.type_name()
    ))
}

// ── list ──────────────────────────────────────────────────────────────────

fn list_method(ev: &mut Evaluator, receiver: &Value, name: &str, args: Args) -> EvalResult<Value> {
    let Value::List(items) = receiver else {
        return Err(no_such_method(receiver, name));
    };
    match name {
        "append" => {
            let [item] = args.exactly("append", 1)? else {
                return Ok(Value::None);
            };
            items.borrow_mut().push(item.clone());
            Ok(Value::None)
        }
        "extend" => {
            let [other] = args.exactly("extend", 1)? else {
                return Ok(Value::None);
            };
            let extra = ev.iterate(other)?;
            let mut items = items.borrow_mut();
            sized(items.len().checked_add(extra.len()), MAX_LIST_LEN, "list")?;
            items.extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(EvalError::Index("pop from empty list".into()));
            }
            let idx = match args.between("pop", 0, 1)? {
                [idx] => sequence_index(idx, items.len(), "pop")?,
                _ => items.len() - 1,
            };
            Ok(items.remove(idx))
        }
        "insert" => {
            let [idx, item] = args.exactly("insert", 2)? else {
                return Ok(Value::None);
            };
            let Some(idx) = idx.as_int() else {
                return Err(EvalError::Type(format!(
                    "'{}' object cannot be interpreted as an integer",
                    idx.type_name()
                )));
            };
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let at = if idx < 0 { (idx + len).max(0) } else { idx.min(len) };
            items.insert(at as usize, item.clone());
            Ok(Value::None)
        }
        "index" => {
            let [needle] = args.exactly("index", 1)? else {
                return Ok(Value::None);
            };
            items
                .borrow()
                .iter()
                .position(|item| item == needle)
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| EvalError::Value(format!("{} is not in list", static_repr(needle))))
        }
        "count" => {
            let [needle] = args.exactly("count", 1)? else {
                return Ok(Value::None);
            };
            let count = items.borrow().iter().filter(|item| *item == needle).count();
            Ok(Value::Int(count as i64))
        }
        "reverse" => {
            args.exactly("reverse", 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => {
            args.exactly("copy", 0)?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => Err(no_such_method(receiver, name)),
    }
}

// ── str ───────────────────────────────────────────────────────────────────

fn str_arg<'a>(value: &'a Value, method: &str) -> EvalResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::Type(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn str_method(ev: &mut Evaluator, s: &str, name: &str, args: Args) -> EvalResult<Value> {
    match name {
        "upper" => {
            args.exactly("upper", 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            args.exactly("lower", 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            args.exactly("strip", 0)?;
            Ok(Value::str(s.trim()))
        }
        "split" => {
            let parts: Vec<Value> = match args.between("split", 0, 1)? {
                [] | [Value::None] => s.split_whitespace().map(Value::str).collect(),
                [sep] => {
                    let sep = str_arg(sep, "split")?;
                    if sep.is_empty() {
                        return Err(EvalError::Value("empty separator".into()));
                    }
                    s.split(sep).map(Value::str).collect()
                }
                _ => Vec::new(),
            };
            Ok(Value::list(parts))
        }
        "join" => {
            let [items] = args.exactly("join", 1)? else {
                return Ok(Value::None);
            };
            let items = ev.iterate(items)?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part.as_str()),
                    other => {
                        return Err(EvalError::Type(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::str(parts.join(s)))
        }
        "startswith" => {
            let [prefix] = args.exactly("startswith", 1)? else {
                return Ok(Value::None);
            };
            Ok(Value::Bool(s.starts_with(str_arg(prefix, "startswith")?)))
        }
        "endswith" => {
            let [suffix] = args.exactly("endswith", 1)? else {
                return Ok(Value::None);
            };
            Ok(Value::Bool(s.ends_with(str_arg(suffix, "endswith")?)))
        }
        "replace" => {
            let [old, new] = args.exactly("replace", 2)? else {
                return Ok(Value::None);
            };
            let (old, new) = (str_arg(old, "replace")?, str_arg(new, "replace")?);
            let hits = if old.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(old).count()
            };
            let len = hits
                .checked_mul(new.len())
                .and_then(|grown| grown.checked_add(s.len()));
            sized(len, MAX_STR_LEN, "string")?;
            Ok(Value::str(s.replace(old, new)))
        }
        _ => Err(no_such_method(&Value::str(s), name)),
    }
}

// ── dict ──────────────────────────────────────────────────────────────────

fn dict_method(receiver: &Value, name: &str, args: Args) -> EvalResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(no_such_method(receiver, name));
    };
    match name {
        "get" => {
            let (key, default) = match args.between("get", 1, 2)? {
                [key] => (key, Value::None),
                [key, default] => (key, default.clone()),
                _ => return Ok(Value::None),
            };
            key.ensure_hashable()?;
            Ok(dict.borrow().get(key).cloned().unwrap_or(default))
        }
        "keys" => {
            args.exactly("keys", 0)?;
            Ok(Value::list(dict.borrow().keys().cloned().collect()))
        }
        "values" => {
            args.exactly("values", 0)?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }
        "items" => {
            args.exactly("items", 0)?;
            let pairs = dict
                .borrow()
                .iter()
                .map(|(k, v)| Value::list(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(pairs))
        }
        "pop" => {
            let (key, default) = match args.between("pop", 1, 2)? {
                [key] => (key, None),
                [key, default] => (key, Some(default.clone())),
                _ => return Ok(Value::None),
            };
            key.ensure_hashable()?;
            match (dict.borrow_mut().remove(key), default) {
                (Some(value), _) | (None, Some(value)) => Ok(value),
                (None, None) => Err(EvalError::Key(static_repr(key))),
            }
        }
        "update" => {
            let [other] = args.exactly("update", 1)? else {
                return Ok(Value::None);
            };
            let Value::Dict(other) = other else {
                return Err(EvalError::Type(format!(
                    "'{}' object is not a mapping",
                    other.type_name()
                )));
            };
            let entries: Vec<(Value, Value)> = other.borrow().iter().cloned().collect();
            let mut dict = dict.borrow_mut();
            for (k, v) in entries {
                dict.insert(k, v);
            }
            Ok(Value::None)
        }
        "copy" => {
            args.exactly("copy", 0)?;
            let copy: Dict = dict.borrow().clone();
            Ok(Value::dict(copy))
        }
        _ => Err(no_such_method(receiver, name)),
    }
}
