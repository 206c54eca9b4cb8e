//! Built-in functions bound in every fresh session's global scope.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::display::str_repr;
use crate::env::Environment;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::io::StreamName;
use crate::ops;
use crate::value::{next_handle, Args, Builtin, BuiltinFn, Module, Value};

/// Largest list `range` will materialize.
pub const MAX_RANGE_LEN: usize = 10_000_000;

/// Exception classes guest code can construct and raise.
pub const EXCEPTION_KINDS: &[&str] = &[
    "Exception",
    "ValueError",
    "TypeError",
    "KeyError",
    "IndexError",
    "NameError",
    "AttributeError",
    "ZeroDivisionError",
    "RuntimeError",
    "AssertionError",
    "NotImplementedError",
];

const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("+", builtin_add),
    ("-", builtin_sub),
    ("*", builtin_mul),
    ("/", builtin_truediv),
    ("//", builtin_floordiv),
    ("%", builtin_mod),
    ("**", builtin_pow),
    ("=", builtin_eq),
    ("!=", builtin_ne),
    ("<", builtin_lt),
    ("<=", builtin_le),
    (">", builtin_gt),
    (">=", builtin_ge),
    ("not", builtin_not),
    ("print", builtin_print),
    ("str", builtin_str),
    ("repr", builtin_repr),
    ("int", builtin_int),
    ("float", builtin_float),
    ("bool", builtin_bool),
    ("len", builtin_len),
    ("list", builtin_list),
    ("range", builtin_range),
    ("abs", builtin_abs),
    ("min", builtin_min),
    ("max", builtin_max),
    ("sum", builtin_sum),
    ("sorted", builtin_sorted),
    ("get", builtin_get),
];

/// Bind every built-in into `env`'s current scope.
pub fn install(env: &mut Environment) {
    for &(name, func) in FUNCTIONS {
        env.define(name, Value::Builtin(Builtin { name, func }));
    }
    for &kind in EXCEPTION_KINDS {
        env.define(
            kind,
            Value::Builtin(Builtin {
                name: kind,
                func: exception_constructor(kind),
            }),
        );
    }
    let mut attrs = BTreeMap::new();
    attrs.insert("stdout".to_string(), Value::Stream(StreamName::Primary));
    attrs.insert("stderr".to_string(), Value::Stream(StreamName::Diagnostic));
    env.define(
        "sys",
        Value::Module(Rc::new(Module {
            name: "sys".into(),
            attrs,
            handle: next_handle(),
        })),
    );
}

pub fn is_exception_constructor(name: &str) -> bool {
    EXCEPTION_KINDS.contains(&name)
}

// ── Exceptions ────────────────────────────────────────────────────────────

fn exception_message(ev: &mut Evaluator, args: Args, kind: &str) -> EvalResult<Value> {
    args.check_keywords(kind, &[])?;
    let message = match args.positional.as_slice() {
        [] => String::new(),
        [one] => ev.to_display_string(one)?,
        many => {
            let parts = many
                .iter()
                .map(|v| ev.repr(v))
                .collect::<EvalResult<Vec<_>>>()?;
            format!("({})", parts.join(", "))
        }
    };
    Ok(Value::exception(kind, message))
}

macro_rules! exception_constructors {
    ($($kind:literal => $func:ident),* $(,)?) => {
        $(
            fn $func(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
                exception_message(ev, args, $kind)
            }
        )*

        fn exception_constructor(kind: &str) -> BuiltinFn {
            match kind {
                $($kind => $func,)*
                _ => exception_generic,
            }
        }
    };
}

exception_constructors! {
    "Exception" => exc_exception,
    "ValueError" => exc_value_error,
    "TypeError" => exc_type_error,
    "KeyError" => exc_key_error,
    "IndexError" => exc_index_error,
    "NameError" => exc_name_error,
    "AttributeError" => exc_attribute_error,
    "ZeroDivisionError" => exc_zero_division_error,
    "RuntimeError" => exc_runtime_error,
    "AssertionError" => exc_assertion_error,
    "NotImplementedError" => exc_not_implemented_error,
}

fn exception_generic(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    exception_message(ev, args, "Exception")
}

// ── Arithmetic ────────────────────────────────────────────────────────────

fn no_keywords(args: &Args, func: &str) -> EvalResult<()> {
    args.check_keywords(func, &[])
}

fn fold(
    args: &[Value],
    op: fn(&Value, &Value) -> EvalResult<Value>,
) -> EvalResult<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Value::None);
    };
    rest.iter().try_fold(first.clone(), |acc, v| op(&acc, v))
}

fn needs_operands(name: &str, args: &Args, min: usize) -> EvalResult<()> {
    no_keywords(args, name)?;
    if args.len() < min {
        return Err(EvalError::Type(format!(
            "{name} needs at least {min} argument{} ({} given)",
            if min == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn builtin_add(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    no_keywords(&args, "+")?;
    match args.positional.as_slice() {
        [] => Ok(Value::Int(0)),
        [one] => match one {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(one.clone()),
            other => Err(EvalError::Type(format!(
                "bad operand type for unary +: '{}'",
                other.type_name()
            ))),
        },
        many => fold(many, ops::add),
    }
}

fn builtin_sub(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    needs_operands("-", &args, 1)?;
    match args.positional.as_slice() {
        [one] => ops::negate(one),
        many => fold(many, ops::sub),
    }
}

fn builtin_mul(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    no_keywords(&args, "*")?;
    if args.positional.is_empty() {
        return Ok(Value::Int(1));
    }
    fold(&args.positional, ops::mul)
}

fn builtin_truediv(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    needs_operands("/", &args, 1)?;
    match args.positional.as_slice() {
        [one] => ops::truediv(&Value::Int(1), one),
        many => fold(many, ops::truediv),
    }
}

fn builtin_floordiv(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    needs_operands("//", &args, 2)?;
    fold(&args.positional, ops::floordiv)
}

fn builtin_mod(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    needs_operands("%", &args, 2)?;
    fold(&args.positional, ops::modulo)
}

/// `**` associates to the right: `(** 2 3 2)` is `2 ** (3 ** 2)`.
fn builtin_pow(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    needs_operands("**", &args, 2)?;
    let mut items = args.positional.iter().rev();
    let Some(last) = items.next() else {
        return Ok(Value::None);
    };
    items.try_fold(last.clone(), |acc, base| ops::pow(base, &acc))
}

// ── Comparison ────────────────────────────────────────────────────────────

/// Chained comparison: true when `op` holds for every adjacent pair.
fn chain(op: &str, args: Args) -> EvalResult<Value> {
    needs_operands(op, &args, 1)?;
    for pair in args.positional.windows(2) {
        if !ops::compare_op(op, &pair[0], &pair[1])? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn builtin_eq(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain("=", args)
}

fn builtin_ne(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain("!=", args)
}

fn builtin_lt(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain("<", args)
}

fn builtin_le(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain("<=", args)
}

fn builtin_gt(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain(">", args)
}

fn builtin_ge(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    chain(">=", args)
}

fn builtin_not(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let [value] = args.exactly("not", 1)? else {
        return Ok(Value::None);
    };
    Ok(Value::Bool(!value.is_truthy()))
}

// ── Output ────────────────────────────────────────────────────────────────

fn text_keyword(args: &Args, name: &str, default: &str) -> EvalResult<String> {
    match args.keyword(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(EvalError::Type(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

/// `(print a b :sep ", " :end "" :file sys.stderr)`
fn builtin_print(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    args.check_keywords("print", &["sep", "end", "file"])?;
    let sep = text_keyword(&args, "sep", " ")?;
    let end = text_keyword(&args, "end", "\n")?;
    let stream = match args.keyword("file") {
        None | Some(Value::None) => StreamName::Primary,
        Some(Value::Stream(name)) => *name,
        Some(other) => {
            return Err(EvalError::Attribute(format!(
                "'{}' object has no attribute 'write'",
                other.type_name()
            )))
        }
    };
    let mut text = String::new();
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            text.push_str(&sep);
        }
        text.push_str(&ev.to_display_string(value)?);
    }
    text.push_str(&end);
    ev.streams()
        .write(stream, &text)
        .map_err(|e| EvalError::Os(e.to_string()))?;
    Ok(Value::None)
}

// ── Conversions ───────────────────────────────────────────────────────────

fn builtin_str(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    match args.between("str", 0, 1)? {
        [value] => Ok(Value::Str(ev.to_display_string(value)?)),
        _ => Ok(Value::str("")),
    }
}

fn builtin_repr(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    match args.exactly("repr", 1)? {
        [value] => Ok(Value::Str(ev.repr(value)?)),
        _ => Ok(Value::None),
    }
}

fn builtin_int(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let value = match args.between("int", 0, 1)? {
        [value] => value,
        _ => return Ok(Value::Int(0)),
    };
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(x) => {
            if x.is_nan() {
                return Err(EvalError::Value("cannot convert float NaN to integer".into()));
            }
            if x.is_infinite() {
                return Err(EvalError::Overflow(
                    "cannot convert float infinity to integer".into(),
                ));
            }
            let truncated = x.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(EvalError::Overflow("integer overflow".into()));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::Value(format!(
                "invalid literal for int() with base 10: {}",
                str_repr(s)
            ))
        }),
        other => Err(EvalError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn builtin_float(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let value = match args.between("float", 0, 1)? {
        [value] => value,
        _ => return Ok(Value::Float(0.0)),
    };
    match value {
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::Value(format!("could not convert string to float: {}", str_repr(s)))
        }),
        other => match other.as_int() {
            Some(n) => Ok(Value::Float(n as f64)),
            None => Err(EvalError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn builtin_bool(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    match args.between("bool", 0, 1)? {
        [value] => Ok(Value::Bool(value.is_truthy())),
        _ => Ok(Value::Bool(false)),
    }
}

fn builtin_list(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    match args.between("list", 0, 1)? {
        [value] => Ok(Value::list(ev.iterate(value)?)),
        _ => Ok(Value::list(Vec::new())),
    }
}

// ── Sequences ─────────────────────────────────────────────────────────────

fn builtin_len(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let [value] = args.exactly("len", 1)? else {
        return Ok(Value::None);
    };
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(dict) => dict.borrow().len(),
        other => {
            return Err(EvalError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
}

fn range_bound(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(EvalError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            other.type_name()
        ))),
    }
}

/// `range` materializes its items as a list.
fn builtin_range(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let (start, stop, step) = match args.between("range", 1, 3)? {
        [stop] => (0, range_bound(stop)?, 1),
        [start, stop] => (range_bound(start)?, range_bound(stop)?, 1),
        [start, stop, step] => (range_bound(start)?, range_bound(stop)?, range_bound(step)?),
        _ => return Ok(Value::list(Vec::new())),
    };
    if step == 0 {
        return Err(EvalError::Value("range() arg 3 must not be zero".into()));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let step_abs = i128::from(step).abs();
    let len = if span <= 0 { 0 } else { (span + step_abs - 1) / step_abs };
    if len > MAX_RANGE_LEN as i128 {
        return Err(EvalError::Overflow(format!(
            "range of {len} items is too large to materialize"
        )));
    }
    let items = (0..len)
        .map(|i| Value::Int((i128::from(start) + i * i128::from(step)) as i64))
        .collect();
    Ok(Value::list(items))
}

fn builtin_abs(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    match args.exactly("abs", 1)? {
        [value] => ops::abs(value),
        _ => Ok(Value::None),
    }
}

/// Items for `min`/`max`: one iterable argument, or the arguments
/// themselves.
fn extremum_items(ev: &Evaluator, args: &Args, func: &str) -> EvalResult<Vec<Value>> {
    args.check_keywords(func, &[])?;
    let items = match args.positional.as_slice() {
        [] => {
            return Err(EvalError::Type(format!(
                "{func} expected at least 1 argument, got 0"
            )))
        }
        [one] => ev.iterate(one)?,
        many => many.to_vec(),
    };
    if items.is_empty() {
        return Err(EvalError::Value(format!("{func}() arg is an empty sequence")));
    }
    Ok(items)
}

fn extremum(ev: &Evaluator, args: Args, func: &str, keep: Ordering) -> EvalResult<Value> {
    let items = extremum_items(ev, &args, func)?;
    let op = if keep == Ordering::Less { "<" } else { ">" };
    let mut best = items[0].clone();
    for item in &items[1..] {
        if ops::compare(op, item, &best)? == Some(keep) {
            best = item.clone();
        }
    }
    Ok(best)
}

fn builtin_min(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    extremum(ev, args, "min", Ordering::Less)
}

fn builtin_max(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    extremum(ev, args, "max", Ordering::Greater)
}

fn builtin_sum(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    let (items, start) = match args.between("sum", 1, 2)? {
        [items] => (items, Value::Int(0)),
        [items, start] => (items, start.clone()),
        _ => return Ok(Value::Int(0)),
    };
    if matches!(start, Value::Str(_)) {
        return Err(EvalError::Type(
            "sum() can't sum strings [use ''.join(seq) instead]".into(),
        ));
    }
    ev.iterate(items)?
        .iter()
        .try_fold(start, |acc, item| ops::add(&acc, item))
}

/// `(sorted items :reverse True)`, stable.
fn builtin_sorted(ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    args.check_keywords("sorted", &["reverse"])?;
    let [items] = args.positional.as_slice() else {
        return Err(EvalError::Type(format!(
            "sorted expected 1 argument, got {}",
            args.len()
        )));
    };
    let reverse = args.keyword("reverse").is_some_and(Value::is_truthy);
    let mut items = ev.iterate(items)?;
    let failure: RefCell<Option<EvalError>> = RefCell::new(None);
    items.sort_by(|a, b| match ops::compare("<", a, b) {
        Ok(ordering) => {
            let ordering = ordering.unwrap_or(Ordering::Equal);
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        }
        Err(err) => {
            failure.borrow_mut().get_or_insert(err);
            Ordering::Equal
        }
    });
    match failure.into_inner() {
        Some(err) => Err(err),
        None => Ok(Value::list(items)),
    }
}

// ── Indexing ──────────────────────────────────────────────────────────────

/// `(get coll key more-keys...)` indexes repeatedly.
fn builtin_get(_ev: &mut Evaluator, args: Args) -> EvalResult<Value> {
    no_keywords(&args, "get")?;
    let Some((coll, keys)) = args.positional.split_first().filter(|(_, keys)| !keys.is_empty()) else {
        return Err(EvalError::Type(format!(
            "get() takes at least 2 arguments ({} given)",
            args.len()
        )));
    };
    keys.iter().try_fold(coll.clone(), |coll, key| index(&coll, key))
}

/// Resolve a possibly negative sequence index.
pub(crate) fn sequence_index(key: &Value, len: usize, what: &str) -> EvalResult<usize> {
    let Some(idx) = key.as_int() else {
        return Err(EvalError::Type(format!(
            "{what} indices must be integers, not {}",
            key.type_name()
        )));
    };
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if idx < 0 { idx + len } else { idx };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(EvalError::Index(format!("{what} index out of range")))
    }
}

pub(crate) fn index(coll: &Value, key: &Value) -> EvalResult<Value> {
    match coll {
        Value::List(items) => {
            let items = items.borrow();
            let idx = sequence_index(key, items.len(), "list")?;
            Ok(items[idx].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = sequence_index(key, chars.len(), "string")?;
            Ok(Value::Str(chars[idx].to_string()))
        }
        Value::Dict(dict) => {
            key.ensure_hashable()?;
            dict.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::Key(crate::display::static_repr(key)))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Streams;

    fn ev() -> Evaluator {
        Evaluator::with_streams(Streams::discard())
    }

    fn call(name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let mut ev = ev();
        let Some(Value::Builtin(builtin)) = ev.env.get(name).cloned() else {
            panic!("{name} is not a builtin");
        };
        (builtin.func)(&mut ev, Args::new(args))
    }

    #[test]
    fn every_builtin_is_installed() {
        let ev = ev();
        for (name, _) in FUNCTIONS {
            assert!(ev.env.get(name).is_some(), "{name} missing");
        }
        for kind in EXCEPTION_KINDS {
            assert!(ev.env.get(kind).is_some(), "{kind} missing");
        }
        assert!(matches!(ev.env.get("sys"), Some(Value::Module(_))));
    }

    #[test]
    fn variadic_arithmetic() {
        assert_eq!(call("+", vec![]).unwrap(), Value::Int(0));
        assert_eq!(
            call("+", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(6)
        );
        assert_eq!(call("-", vec![Value::Int(5)]).unwrap(), Value::Int(-5));
        assert_eq!(
            call("**", vec![Value::Int(2), Value::Int(3), Value::Int(2)]).unwrap(),
            Value::Int(512)
        );
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(
            call("<", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("<", vec![Value::Int(1), Value::Int(3), Value::Int(2)]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn range_forms() {
        let list = |v: Vec<i64>| Value::list(v.into_iter().map(Value::Int).collect());
        assert_eq!(call("range", vec![Value::Int(3)]).unwrap(), list(vec![0, 1, 2]));
        assert_eq!(
            call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            list(vec![5, 3, 1])
        );
        assert!(matches!(
            call("range", vec![Value::Int(0), Value::Int(1), Value::Int(0)]),
            Err(EvalError::Value(_))
        ));
    }

    #[test]
    fn int_parsing() {
        assert_eq!(call("int", vec![Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call("int", vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        let err = call("int", vec![Value::str("abc")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid literal for int() with base 10: 'abc'");
    }

    #[test]
    fn get_with_negative_index_and_missing_key() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(call("get", vec![list.clone(), Value::Int(-1)]).unwrap(), Value::Int(2));
        assert!(matches!(
            call("get", vec![list, Value::Int(2)]),
            Err(EvalError::Index(_))
        ));
        let dict = Value::dict(Default::default());
        let err = call("get", vec![dict, Value::str("k")]).unwrap_err();
        assert_eq!(err, EvalError::Key("'k'".into()));
    }

    #[test]
    fn sorted_reports_incomparable_items() {
        let items = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert!(matches!(call("sorted", vec![items]), Err(EvalError::Type(_))));
    }

    #[test]
    fn min_max() {
        let items = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(call("min", vec![items.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("max", vec![items]).unwrap(), Value::Int(3));
        assert!(matches!(
            call("max", vec![Value::list(vec![])]),
            Err(EvalError::Value(_))
        ));
    }

    #[test]
    fn exception_constructor_builds_value() {
        let value = call("ValueError", vec![Value::str("bad")]).unwrap();
        match value {
            Value::Exception(exc) => {
                assert_eq!(exc.kind, "ValueError");
                assert_eq!(exc.message, "bad");
            }
            other => panic!("expected exception, got {other:?}"),
        }
    }
}
