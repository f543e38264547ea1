//! Value-level operator semantics shared by compiled expressions.

use crate::ast::{ArithmeticOp, ComparisonOp};
use braid_core::pattern_match;
use braid_core::{Error, Result, Value};
use std::cmp::Ordering;

/// Reads a boolean operand. Null is unknown.
pub(crate) fn truth(value: &Value, expression: &str) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(Error::type_mismatch(
            expression,
            format!("expected boolean, got {}", describe(other)),
        )),
    }
}

pub(crate) fn from_truth(value: Option<bool>) -> Value {
    value.map(Value::Boolean).unwrap_or(Value::Null)
}

/// Three-valued AND: false wins over unknown.
pub(crate) fn and3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Three-valued OR: true wins over unknown.
pub(crate) fn or3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

pub(crate) fn compare(op: ComparisonOp, left: &Value, right: &Value, expression: &str) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let ordering = left.sql_cmp(right).ok_or_else(|| {
        Error::type_mismatch(
            expression,
            format!("cannot compare {} with {}", describe(left), describe(right)),
        )
    })?;
    let result = match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
    };
    Ok(Value::Boolean(result))
}

/// Arithmetic with numeric widening.
///
/// Int32 with Int32 stays Int32 unless it overflows, mixed integers become
/// Int64, anything with a Float64 becomes Float64. Division or modulo by zero
/// yields null. `+` with a string operand concatenates, DateTime plus or
/// minus an integer shifts the timestamp.
pub(crate) fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value, expression: &str) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || {
        Error::type_mismatch(
            expression,
            format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                describe(left),
                describe(right)
            ),
        )
    };
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => match int_op(op, *a as i64, *b as i64) {
            Some(Some(v)) => Ok(i32::try_from(v).map(Value::Int32).unwrap_or(Value::Int64(v))),
            Some(None) => Ok(Value::Null),
            None => Err(overflow(expression)),
        },
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            let (a, b) = (left.as_i64().unwrap_or_default(), right.as_i64().unwrap_or_default());
            match int_op(op, a, b) {
                Some(Some(v)) => Ok(Value::Int64(v)),
                Some(None) => Ok(Value::Null),
                None => Err(overflow(expression)),
            }
        }
        (l, r) if l.is_numeric() && r.is_numeric() => {
            let (a, b) = (l.as_f64().unwrap_or_default(), r.as_f64().unwrap_or_default());
            Ok(float_op(op, a, b))
        }
        (Value::String(a), b) if op == ArithmeticOp::Add => Ok(Value::String(format!("{}{}", a, b))),
        (a, Value::String(b)) if op == ArithmeticOp::Add => Ok(Value::String(format!("{}{}", a, b))),
        (Value::DateTime(t), Value::Int32(_) | Value::Int64(_)) => {
            let delta = right.as_i64().unwrap_or_default();
            match op {
                ArithmeticOp::Add => t.checked_add(delta).map(Value::DateTime).ok_or_else(|| overflow(expression)),
                ArithmeticOp::Sub => t.checked_sub(delta).map(Value::DateTime).ok_or_else(|| overflow(expression)),
                _ => Err(mismatch()),
            }
        }
        (Value::DateTime(a), Value::DateTime(b)) if op == ArithmeticOp::Sub => Ok(Value::Int64(a - b)),
        _ => Err(mismatch()),
    }
}

/// Outer None on overflow, inner None on division by zero.
fn int_op(op: ArithmeticOp, a: i64, b: i64) -> Option<Option<i64>> {
    match op {
        ArithmeticOp::Add => a.checked_add(b).map(Some),
        ArithmeticOp::Sub => a.checked_sub(b).map(Some),
        ArithmeticOp::Mul => a.checked_mul(b).map(Some),
        ArithmeticOp::Div if b == 0 => Some(None),
        ArithmeticOp::Div => a.checked_div(b).map(Some),
        ArithmeticOp::Mod if b == 0 => Some(None),
        ArithmeticOp::Mod => a.checked_rem(b).map(Some),
    }
}

fn float_op(op: ArithmeticOp, a: f64, b: f64) -> Value {
    match op {
        ArithmeticOp::Add => Value::Float64(a + b),
        ArithmeticOp::Sub => Value::Float64(a - b),
        ArithmeticOp::Mul => Value::Float64(a * b),
        ArithmeticOp::Div | ArithmeticOp::Mod if b == 0.0 => Value::Null,
        ArithmeticOp::Div => Value::Float64(a / b),
        ArithmeticOp::Mod => Value::Float64(a % b),
    }
}

fn overflow(expression: &str) -> Error {
    Error::type_mismatch(expression, "integer overflow")
}

pub(crate) fn negate(value: &Value, expression: &str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int32(v) => Ok(v.checked_neg().map(Value::Int32).unwrap_or(Value::Int64(-(*v as i64)))),
        Value::Int64(v) => v.checked_neg().map(Value::Int64).ok_or_else(|| overflow(expression)),
        Value::Float64(v) => Ok(Value::Float64(-v)),
        other => Err(Error::type_mismatch(
            expression,
            format!("cannot negate {}", describe(other)),
        )),
    }
}

/// SQL IN: true on a match, unknown when no match but null is involved.
pub(crate) fn in_list(value: &Value, list: &[Value]) -> Option<bool> {
    if value.is_null() {
        return None;
    }
    let mut saw_null = false;
    for item in list {
        if item.is_null() {
            saw_null = true;
        } else if value.sql_eq(item) {
            return Some(true);
        }
    }
    if saw_null {
        None
    } else {
        Some(false)
    }
}

pub(crate) fn like(value: &Value, pattern: &Value, expression: &str) -> Result<Option<bool>> {
    match (value, pattern) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::String(v), Value::String(p)) => Ok(Some(pattern_match::like(v, p))),
        (v, p) => Err(Error::type_mismatch(
            expression,
            format!("LIKE expects strings, got {} and {}", describe(v), describe(p)),
        )),
    }
}

fn describe(value: &Value) -> String {
    match value.data_type() {
        Some(t) => format!("{:?}", t),
        None => "null".to_string(),
    }
}
