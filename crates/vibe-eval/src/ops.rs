//! Arithmetic and comparison with Python semantics.
//!
//! Integers are `i64` with checked arithmetic; overflow raises
//! `OverflowError` instead of promoting to a big integer.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::value::{checked_eq, Value, MAX_COMPARE_DEPTH};

/// Longest list that concatenation or repetition will build.
pub const MAX_LIST_LEN: usize = 10_000_000;
/// Longest string, in bytes, that concatenation or repetition will build.
pub const MAX_STR_LEN: usize = 100_000_000;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Option<Num> {
    match value {
        Value::Float(x) => Some(Num::Float(*x)),
        other => other.as_int().map(Num::Int),
    }
}

fn both(a: &Value, b: &Value) -> Option<(Num, Num)> {
    Some((num(a)?, num(b)?))
}

fn as_float(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(x) => x,
    }
}

fn overflow() -> EvalError {
    EvalError::Overflow("integer overflow".into())
}

/// Check a computed sequence length against `limit`. `None` means the
/// length itself overflowed.
pub(crate) fn sized(len: Option<usize>, limit: usize, what: &str) -> EvalResult<usize> {
    match len {
        Some(len) if len <= limit => Ok(len),
        Some(len) => Err(EvalError::Memory(format!(
            "cannot build a {what} of {len} items"
        ))),
        None => Err(EvalError::Overflow(format!("repeated {what} is too long"))),
    }
}

/// Repetition count: negatives repeat zero times.
fn times(n: &Value) -> usize {
    n.as_int()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn unsupported(op: &str, a: &Value, b: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

/// Integer-with-float arithmetic: `int_op` for two ints, `float_op` otherwise.
fn arith(
    op: &str,
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match both(a, b) {
        Some((Num::Int(x), Num::Int(y))) => int_op(x, y).map(Value::Int).ok_or_else(overflow),
        Some((x, y)) => Ok(Value::Float(float_op(as_float(x), as_float(y)))),
        None => Err(unsupported(op, a, b)),
    }
}

pub fn add(a: &Value, b: &Value) -> EvalResult<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            sized(x.len().checked_add(y.len()), MAX_STR_LEN, "string")?;
            Ok(Value::Str(format!("{x}{y}")))
        }
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            sized(x.len().checked_add(y.len()), MAX_LIST_LEN, "list")?;
            let items = x.iter().chain(y.iter()).cloned().collect();
            Ok(Value::list(items))
        }
        _ => arith("+", a, b, i64::checked_add, |x, y| x + y),
    }
}

pub fn sub(a: &Value, b: &Value) -> EvalResult<Value> {
    arith("-", a, b, i64::checked_sub, |x, y| x - y)
}

pub fn mul(a: &Value, b: &Value) -> EvalResult<Value> {
    match (a, b) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => {
            let times = times(n);
            if s.is_empty() || times == 0 {
                return Ok(Value::str(""));
            }
            sized(s.len().checked_mul(times), MAX_STR_LEN, "string")?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), n) | (n, Value::List(items)) if n.as_int().is_some() => {
            let items = items.borrow();
            let len = sized(items.len().checked_mul(times(n)), MAX_LIST_LEN, "list")?;
            let out = items.iter().cycle().take(len).cloned().collect();
            Ok(Value::list(out))
        }
        _ => arith("*", a, b, i64::checked_mul, |x, y| x * y),
    }
}

/// `/` always produces a float.
pub fn truediv(a: &Value, b: &Value) -> EvalResult<Value> {
    let Some((x, y)) = both(a, b) else {
        return Err(unsupported("/", a, b));
    };
    let (x, y) = (as_float(x), as_float(y));
    if y == 0.0 {
        return Err(EvalError::ZeroDivision("division by zero".into()));
    }
    Ok(Value::Float(x / y))
}

/// `//` rounds toward negative infinity.
pub fn floordiv(a: &Value, b: &Value) -> EvalResult<Value> {
    match both(a, b) {
        Some((Num::Int(_), Num::Int(0))) => Err(EvalError::ZeroDivision(
            "integer division or modulo by zero".into(),
        )),
        Some((Num::Int(x), Num::Int(y))) => {
            let q = x.checked_div(y).ok_or_else(overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        Some((x, y)) => {
            let (x, y) = (as_float(x), as_float(y));
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float floor division by zero".into()));
            }
            Ok(Value::Float((x / y).floor()))
        }
        None => Err(unsupported("//", a, b)),
    }
}

/// `%` takes the sign of the divisor.
pub fn modulo(a: &Value, b: &Value) -> EvalResult<Value> {
    match both(a, b) {
        Some((Num::Int(_), Num::Int(0))) => {
            Err(EvalError::ZeroDivision("integer modulo by zero".into()))
        }
        Some((Num::Int(x), Num::Int(y))) => {
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        }
        Some((x, y)) => {
            let (x, y) = (as_float(x), as_float(y));
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo".into()));
            }
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
        }
        None => Err(unsupported("%", a, b)),
    }
}

pub fn pow(a: &Value, b: &Value) -> EvalResult<Value> {
    match both(a, b) {
        Some((Num::Int(x), Num::Int(y))) if y >= 0 => {
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
        Some((x, y)) => {
            let (x, y) = (as_float(x), as_float(y));
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::ZeroDivision(
                    "0.0 cannot be raised to a negative power".into(),
                ));
            }
            Ok(Value::Float(x.powf(y)))
        }
        None => Err(unsupported("** or pow()", a, b)),
    }
}

pub fn negate(a: &Value) -> EvalResult<Value> {
    match num(a) {
        Some(Num::Int(x)) => x.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Num::Float(x)) => Ok(Value::Float(-x)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary -: '{}'",
            a.type_name()
        ))),
    }
}

pub fn abs(a: &Value) -> EvalResult<Value> {
    match num(a) {
        Some(Num::Int(x)) => x.checked_abs().map(Value::Int).ok_or_else(overflow),
        Some(Num::Float(x)) => Ok(Value::Float(x.abs())),
        None => Err(EvalError::Type(format!(
            "bad operand type for abs(): '{}'",
            a.type_name()
        ))),
    }
}

// ── Comparison ────────────────────────────────────────────────────────────

/// Ordering between two values; `None` for unordered floats (NaN).
pub fn compare(op: &str, a: &Value, b: &Value) -> EvalResult<Option<Ordering>> {
    compare_nested(op, a, b, 0)
}

fn compare_nested(op: &str, a: &Value, b: &Value, depth: usize) -> EvalResult<Option<Ordering>> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(Some(Ordering::Equal));
            }
            if depth >= MAX_COMPARE_DEPTH {
                return Err(EvalError::Recursion);
            }
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            for (l, r) in x.iter().zip(y.iter()) {
                if !checked_eq(l, r)? {
                    return stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                        compare_nested(op, l, r, depth + 1)
                    });
                }
            }
            Ok(Some(x.len().cmp(&y.len())))
        }
        _ => match both(a, b) {
            Some((Num::Int(x), Num::Int(y))) => Ok(Some(x.cmp(&y))),
            Some((x, y)) => Ok(as_float(x).partial_cmp(&as_float(y))),
            None => Err(EvalError::Type(format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

/// Apply one comparison operator to a pair.
pub fn compare_op(op: &str, a: &Value, b: &Value) -> EvalResult<bool> {
    match op {
        "=" => checked_eq(a, b),
        "!=" => checked_eq(a, b).map(|equal| !equal),
        _ => {
            let ordering = compare(op, a, b)?;
            Ok(match (op, ordering) {
                (_, None) => false,
                ("<", Some(o)) => o == Ordering::Less,
                ("<=", Some(o)) => o != Ordering::Greater,
                (">", Some(o)) => o == Ordering::Greater,
                (">=", Some(o)) => o != Ordering::Less,
                _ => false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_and_modulo_follow_the_divisor_sign() {
        assert_eq!(floordiv(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(modulo(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(modulo(&Value::Int(7), &Value::Int(-2)).unwrap(), Value::Int(-1));
    }

    #[test]
    fn true_division_is_float() {
        assert_eq!(truediv(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert!(matches!(
            truediv(&Value::Int(1), &Value::Int(0)),
            Err(EvalError::ZeroDivision(_))
        ));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            add(&Value::Int(i64::MAX), &Value::Int(1)),
            Err(EvalError::Overflow(_))
        ));
        assert!(matches!(pow(&Value::Int(2), &Value::Int(64)), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn mixed_types_are_type_errors() {
        let err = add(&Value::Int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn sequence_repetition() {
        assert_eq!(mul(&Value::str("ab"), &Value::Int(3)).unwrap(), Value::str("ababab"));
        assert_eq!(mul(&Value::Int(-1), &Value::str("ab")).unwrap(), Value::str(""));
        let pair = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            mul(&Value::Int(2), &pair).unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn oversized_repetition_fails_before_allocating() {
        let pair = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            mul(&pair, &Value::Int(1 << 62)),
            Err(EvalError::Memory(_))
        ));
        assert!(matches!(
            mul(&Value::str("ab"), &Value::Int(100_000_000_000_000)),
            Err(EvalError::Memory(_))
        ));
        assert!(matches!(
            mul(&Value::str("abcd"), &Value::Int(i64::MAX)),
            Err(EvalError::Overflow(_))
        ));
        // Nothing to repeat, so any count is cheap.
        assert_eq!(
            mul(&Value::list(vec![]), &Value::Int(i64::MAX)).unwrap(),
            Value::list(vec![])
        );
        assert_eq!(mul(&Value::str(""), &Value::Int(i64::MAX)).unwrap(), Value::str(""));
    }

    #[test]
    fn self_referencing_lists_compare_with_recursion_error() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        for list in [&a, &b] {
            if let Value::List(items) = list {
                items.borrow_mut().push(list.clone());
            }
        }
        assert_eq!(compare_op("=", &a, &b), Err(EvalError::Recursion));
        assert_eq!(compare_op("<", &a, &b), Err(EvalError::Recursion));
        assert!(compare_op("=", &a, &a).unwrap());
        // Break the cycles so the test does not leak.
        for list in [&a, &b] {
            if let Value::List(items) = list {
                items.borrow_mut().clear();
            }
        }
    }

    #[test]
    fn deeply_nested_lists_compare() {
        let nest = || {
            (0..50_000).fold(Value::list(vec![]), |inner, _| Value::list(vec![inner]))
        };
        // Deeper than the comparison limit.
        assert_eq!(compare_op("=", &nest(), &nest()), Err(EvalError::Recursion));
        let wrap = |leaf: i64| {
            (0..5_000).fold(Value::Int(leaf), |inner, _| Value::list(vec![inner]))
        };
        assert!(compare_op("<", &wrap(1), &wrap(2)).unwrap());
        assert!(compare_op("=", &wrap(1), &wrap(1)).unwrap());
    }

    #[test]
    fn comparisons() {
        assert!(compare_op("<", &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(compare_op(">=", &Value::str("b"), &Value::str("a")).unwrap());
        assert!(!compare_op("<", &Value::Float(f64::NAN), &Value::Int(1)).unwrap());
        assert!(compare_op("<", &Value::Int(1), &Value::str("a")).is_err());
    }
}
