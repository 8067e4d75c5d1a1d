//! Tests for mapping, sequence and scalar comparison.

use rstest::rstest;
use serde_json::json;

use super::value;
use crate::{MatchError, Matcher};

#[rstest]
#[case::extra_keys_ignored(json!({"a": 1}), json!({"a": 1, "b": 2}), true)]
#[case::nested_extra_keys_ignored(json!({"a": {"b": 1}}), json!({"a": {"b": 1, "c": 2}}), true)]
#[case::missing_key(json!({"a": 1, "b": 2}), json!({"a": 1}), false)]
#[case::int_matches_long(json!(3), json!({"$numberLong": "3"}), true)]
#[case::int_matches_double(json!(3), json!(3.0), true)]
#[case::long_matches_double(json!({"$numberLong": "3"}), json!(3.0), true)]
#[case::fraction_differs(json!(3), json!(3.5), false)]
#[case::decimal_not_int(json!({"$numberDecimal": "3"}), json!(3), false)]
#[case::decimal_matches_decimal(json!({"$numberDecimal": "3.0"}), json!({"$numberDecimal": "3"}), true)]
#[case::string_not_number(json!("3"), json!(3), false)]
#[case::null_matches_null(json!(null), json!(null), true)]
#[case::ordered_sequence(json!([1, 2]), json!([1, 2]), true)]
#[case::sequence_order_matters(json!([1, 2]), json!([2, 1]), false)]
#[case::sequence_length_matters(json!([1]), json!([1, 2]), false)]
#[case::documents_in_sequences(json!([{"a": 1}]), json!([{"a": 1, "b": 2}]), true)]
fn structural_matching(
    #[case] expected: serde_json::Value,
    #[case] actual: serde_json::Value,
    #[case] outcome: bool,
) {
    let matcher = Matcher::standalone();
    assert_eq!(matcher.matches(&value(expected), &value(actual)), outcome);
}

#[test]
fn matching_is_idempotent() {
    let matcher = Matcher::standalone();
    let expected = value(json!({"x": {"$$lte": 2}, "y": [1, {"$$type": "int"}]}));
    let actual = value(json!({"_id": 1, "x": 2, "y": [1, 5]}));
    let first = matcher.check(&expected, &actual);
    let second = matcher.check(&expected, &actual);
    assert_eq!(first, second);
    assert!(first.is_ok());
}

#[test]
fn mismatch_reports_path_to_divergence() {
    let matcher = Matcher::standalone();
    let error = matcher
        .check(
            &value(json!({"cursor": {"firstBatch": [{"x": 1}, {"x": 2}]}})),
            &value(json!({"cursor": {"firstBatch": [{"x": 1}, {"x": 3}]}})),
        )
        .expect_err("values differ");
    let mismatch = error.as_mismatch().expect("mismatch");
    assert_eq!(mismatch.path.to_string(), "$.cursor.firstBatch[1].x");
    assert_eq!(mismatch.expected, value(json!(2)));
    assert_eq!(mismatch.actual, Some(value(json!(3))));
    assert!(!error.is_specification_error());
}

#[test]
fn unknown_operator_is_specification_error() {
    let matcher = Matcher::standalone();
    let error = matcher
        .check(&value(json!({"a": {"$$frobnicate": 1}})), &value(json!({"a": 1})))
        .expect_err("unknown operator");
    assert!(matches!(
        &error,
        MatchError::UnsupportedOperator { name, .. } if name == "$$frobnicate"
    ));
    assert!(error.is_specification_error());
}

#[test]
fn single_dollar_keys_are_plain_fields() {
    let matcher = Matcher::standalone();
    assert!(matcher.matches(
        &value(json!({"update": {"$set": {"x": 1}}})),
        &value(json!({"update": {"$set": {"x": 1}}, "multi": false}))
    ));
}
