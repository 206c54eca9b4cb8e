//! Textual forms of values: `repr` (unambiguous) and `str` (for `print`).
//!
//! Instances of guest classes may override either with `__repr__` and
//! `__str__`; those hooks run guest code and so live on the evaluator.
//! [`static_repr`] never runs guest code.
//!
//! Containers nested deeper than [`MAX_DISPLAY_DEPTH`] are not walked:
//! `repr` raises `RecursionError` and [`static_repr`] elides them.

use std::rc::Rc;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{Evaluator, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::value::{Args, Callee, Value};

/// Deepest container nesting rendered as text.
pub const MAX_DISPLAY_DEPTH: usize = 1000;

impl Evaluator {
    /// `repr(value)`, honouring `__repr__` hooks.
    pub fn repr(&mut self, value: &Value) -> EvalResult<String> {
        let mut out = String::new();
        self.write_repr(value, &mut out)?;
        Ok(out)
    }

    /// `str(value)`, honouring `__str__` and then `__repr__` hooks.
    pub fn to_display_string(&mut self, value: &Value) -> EvalResult<String> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Exception(exc) => Ok(exc.message.clone()),
            Value::Instance(instance) => match instance.class.lookup("__str__") {
                Some(hook) => self.call_text_hook(value, hook, "__str__"),
                None => self.repr(value),
            },
            other => self.repr(other),
        }
    }

    fn write_repr(&mut self, value: &Value, out: &mut String) -> EvalResult<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.write_repr_inner(value, out))
    }

    fn write_repr_inner(&mut self, value: &Value, out: &mut String) -> EvalResult<()> {
        match value {
            Value::List(items) => {
                let key = Rc::as_ptr(items) as *const () as usize;
                if self.repr_active.contains(&key) {
                    out.push_str("[...]");
                    return Ok(());
                }
                if self.repr_active.len() >= MAX_DISPLAY_DEPTH {
                    return Err(EvalError::Recursion);
                }
                let items = items.borrow().clone();
                self.repr_active.push(key);
                out.push('[');
                let result = self.write_sequence(&items, out);
                self.repr_active.pop();
                result?;
                out.push(']');
            }
            Value::Dict(dict) => {
                let key = Rc::as_ptr(dict) as *const () as usize;
                if self.repr_active.contains(&key) {
                    out.push_str("{...}");
                    return Ok(());
                }
                if self.repr_active.len() >= MAX_DISPLAY_DEPTH {
                    return Err(EvalError::Recursion);
                }
                let entries: Vec<(Value, Value)> = dict.borrow().iter().cloned().collect();
                self.repr_active.push(key);
                out.push('{');
                let result = self.write_entries(&entries, out);
                self.repr_active.pop();
                result?;
                out.push('}');
            }
            Value::Instance(instance) => match instance.class.lookup("__repr__") {
                Some(hook) => {
                    let text = self.call_text_hook(value, hook, "__repr__")?;
                    out.push_str(&text);
                }
                None => out.push_str(&static_repr(value)),
            },
            other => out.push_str(&static_repr(other)),
        }
        Ok(())
    }

    fn write_sequence(&mut self, items: &[Value], out: &mut String) -> EvalResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_repr(item, out)?;
        }
        Ok(())
    }

    fn write_entries(&mut self, entries: &[(Value, Value)], out: &mut String) -> EvalResult<()> {
        for (i, (key, value)) in entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_repr(key, out)?;
            out.push_str(": ");
            self.write_repr(value, out)?;
        }
        Ok(())
    }

    /// Call a zero-argument text hook such as `__repr__` on `receiver`.
    pub(crate) fn call_text_hook(&mut self, receiver: &Value, hook: Value, name: &str) -> EvalResult<String> {
        let result = match hook {
            Value::Function(lambda) => self.call_lambda(&lambda, Some(receiver.clone()), Args::default())?,
            other => self.call_value(&other, Args::default())?,
        };
        match result {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::Type(format!(
                "{name} returned non-string (type {})",
                other.type_name()
            ))),
        }
    }
}

/// `repr` without running any guest hooks.
pub fn static_repr(value: &Value) -> String {
    let mut out = String::new();
    write_static(value, &mut Vec::new(), &mut out);
    out
}

fn write_static(value: &Value, active: &mut Vec<usize>, out: &mut String) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || write_static_inner(value, active, out))
}

fn write_static_inner(value: &Value, active: &mut Vec<usize>, out: &mut String) {
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(x) => out.push_str(&float_repr(*x)),
        Value::Str(s) => out.push_str(&str_repr(s)),
        Value::Keyword(k) => {
            out.push(':');
            out.push_str(k);
        }
        Value::List(items) => {
            let key = Rc::as_ptr(items) as *const () as usize;
            if active.len() >= MAX_DISPLAY_DEPTH || active.contains(&key) {
                out.push_str("[...]");
                return;
            }
            active.push(key);
            out.push('[');
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_static(item, active, out);
            }
            out.push(']');
            active.pop();
        }
        Value::Dict(dict) => {
            let key = Rc::as_ptr(dict) as *const () as usize;
            if active.len() >= MAX_DISPLAY_DEPTH || active.contains(&key) {
                out.push_str("{...}");
                return;
            }
            active.push(key);
            out.push('{');
            for (i, (k, v)) in dict.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_static(k, active, out);
                out.push_str(": ");
                write_static(v, active, out);
            }
            out.push('}');
            active.pop();
        }
        Value::Function(lambda) => {
            out.push_str(&format!("<function {} at {:#x}>", lambda.name, lambda.handle))
        }
        Value::Builtin(builtin) => out.push_str(&format!("<built-in function {}>", builtin.name)),
        Value::Class(class) => out.push_str(&format!("<class '__main__.{}'>", class.name)),
        Value::Instance(instance) => out.push_str(&format!(
            "<__main__.{} object at {:#x}>",
            instance.class.name, instance.handle
        )),
        Value::Method(method) => match &method.callee {
            Callee::Guest(lambda) => out.push_str(&format!(
                "<bound method {}.{}>",
                method.receiver.type_name(),
                lambda.name
            )),
            Callee::Native(name) => out.push_str(&format!(
                "<built-in method {name} of {} object>",
                method.receiver.type_name()
            )),
        },
        Value::Exception(exc) => {
            out.push_str(&format!("{}({})", exc.kind, str_repr(&exc.message)))
        }
        Value::Module(module) => out.push_str(&format!("<module '{}' (built-in)>", module.name)),
        Value::Stream(name) => out.push_str(&format!(
            "<_io.TextIOWrapper name='<{}>' mode='w' encoding='utf-8'>",
            name.as_str()
        )),
    }
}

/// Python's float repr: always shows a fractional part or an exponent.
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if x.abs() >= 1e16 {
        let text = format!("{x:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    if x == x.trunc() {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Python's str repr: single quotes unless the text contains one and no
/// double quote.
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
