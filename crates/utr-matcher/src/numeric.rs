//! Numeric comparison across integer, double and decimal values.
//!
//! Integers and doubles compare by exact mathematical value: an `Int64` near
//! `i64::MAX` is never rounded through `f64`. Decimals are approximated as
//! doubles for ordering but only equal other decimals.

use std::cmp::Ordering;

use utr_model::Value;

/// Whether two numeric values are equal for matching purposes.
///
/// `Int32`, `Int64` and `Double` are interchangeable; `Decimal128` equals
/// only another `Decimal128` of the same value.
#[must_use]
pub fn numbers_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Decimal128(left), Value::Decimal128(right)) => {
            left == right
                || match (left.to_f64(), right.to_f64()) {
                    (Some(l), Some(r)) => l.total_cmp(&r).is_eq(),
                    _ => false,
                }
        }
        (Value::Decimal128(_), _) | (_, Value::Decimal128(_)) => false,
        _ => compare_numbers(expected, actual) == Some(Ordering::Equal),
    }
}

/// Orders two numeric values by mathematical value.
///
/// Returns `None` when either value is not numeric or is NaN.
#[must_use]
pub fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    match (exact(left)?, exact(right)?) {
        (Exact::Int(l), Exact::Int(r)) => Some(l.cmp(&r)),
        (Exact::Int(l), Exact::Float(r)) => compare_int_float(l, r),
        (Exact::Float(l), Exact::Int(r)) => compare_int_float(r, l).map(Ordering::reverse),
        (Exact::Float(l), Exact::Float(r)) => l.partial_cmp(&r),
    }
}

enum Exact {
    Int(i64),
    Float(f64),
}

fn exact(value: &Value) -> Option<Exact> {
    match value {
        Value::Int32(number) => Some(Exact::Int(i64::from(*number))),
        Value::Int64(number) => Some(Exact::Int(*number)),
        Value::Double(number) => Some(Exact::Float(*number)),
        Value::Decimal128(decimal) => decimal.to_f64().map(Exact::Float),
        _ => None,
    }
}

fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63 is the first double above the i64 range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the truncated value is within the i64 range checked above"
    )]
    let whole = float.trunc() as i64;
    match int.cmp(&whole) {
        Ordering::Equal => 0.0_f64.partial_cmp(&float.fract()),
        ordering => Some(ordering),
    }
}
