//! Tests for exact numeric comparison.

use std::cmp::Ordering;

use rstest::rstest;
use utr_model::{Decimal128, Value};

use crate::{compare_numbers, numbers_equal};

#[rstest]
#[case::ints(Value::Int32(1), Value::Int32(2), Some(Ordering::Less))]
#[case::int_long(Value::Int32(2), Value::Int64(2), Some(Ordering::Equal))]
#[case::long_double_fraction(Value::Int64(2), Value::Double(2.5), Some(Ordering::Less))]
#[case::negative_fraction(Value::Int64(-2), Value::Double(-2.5), Some(Ordering::Greater))]
#[case::double_long(Value::Double(3.0), Value::Int64(2), Some(Ordering::Greater))]
#[case::max_long_vs_rounded_double(Value::Int64(i64::MAX), Value::Double(9.223_372_036_854_776e18), Some(Ordering::Less))]
#[case::nan(Value::Double(f64::NAN), Value::Int32(1), None)]
#[case::decimal_approximated(Value::Decimal128(Decimal128::new("1.5")), Value::Int32(2), Some(Ordering::Less))]
#[case::non_numeric(Value::from("1"), Value::Int32(1), None)]
fn orders_by_mathematical_value(
    #[case] left: Value,
    #[case] right: Value,
    #[case] expected: Option<Ordering>,
) {
    assert_eq!(compare_numbers(&left, &right), expected);
}

#[test]
fn large_longs_are_not_rounded() {
    let near_max = Value::Int64(i64::MAX - 1);
    assert!(!numbers_equal(&near_max, &Value::Int64(i64::MAX)));
    assert_eq!(
        compare_numbers(&near_max, &Value::Int64(i64::MAX)),
        Some(Ordering::Less)
    );
}

#[test]
fn decimals_equal_only_decimals() {
    let decimal = Value::Decimal128(Decimal128::new("2"));
    assert!(numbers_equal(&decimal, &Value::Decimal128(Decimal128::new("2.0"))));
    assert!(!numbers_equal(&decimal, &Value::Int32(2)));
    assert!(!numbers_equal(&Value::Double(2.0), &decimal));
}
