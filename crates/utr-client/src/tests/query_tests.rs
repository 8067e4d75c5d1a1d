//! Tests for filter evaluation, sorting and projection.

use std::cmp::Ordering;

use rstest::rstest;
use serde_json::json;
use utr_model::{Document, Value};

use super::doc;
use crate::codes::BAD_VALUE;
use crate::memory::query::{compare_values, matches_filter, project, sort_documents};

fn sample() -> Document {
    doc(json!({"_id": 1, "x": 2, "tags": ["a", "b"], "a": {"b": 1}}))
}

#[rstest]
#[case::equality(json!({"x": 2}), true)]
#[case::double_equals_int(json!({"x": 2.0}), true)]
#[case::long_equals_int(json!({"x": {"$numberLong": "2"}}), true)]
#[case::greater(json!({"x": {"$gt": 1}}), true)]
#[case::greater_or_equal(json!({"x": {"$gte": 2}}), true)]
#[case::less_fails(json!({"x": {"$lt": 2}}), false)]
#[case::range(json!({"x": {"$gt": 1, "$lte": 2}}), true)]
#[case::not_equal(json!({"x": {"$ne": 3}}), true)]
#[case::membership(json!({"x": {"$in": [1, 2]}}), true)]
#[case::exclusion(json!({"x": {"$nin": [2]}}), false)]
#[case::absent_field(json!({"y": {"$exists": false}}), true)]
#[case::present_field(json!({"x": {"$exists": true}}), true)]
#[case::null_matches_missing(json!({"y": null}), true)]
#[case::array_element(json!({"tags": "a"}), true)]
#[case::dotted_path(json!({"a.b": 1}), true)]
#[case::disjunction(json!({"$or": [{"x": 1}, {"x": 2}]}), true)]
#[case::conjunction(json!({"$and": [{"x": 2}, {"_id": 2}]}), false)]
#[case::negated_disjunction(json!({"$nor": [{"x": 1}]}), true)]
#[case::string_never_greater_than_number(json!({"x": {"$gt": "1"}}), false)]
fn filters_select_documents(#[case] filter: serde_json::Value, #[case] expected: bool) {
    let outcome = matches_filter(&sample(), &doc(filter)).expect("valid filter");
    assert_eq!(outcome, expected);
}

#[rstest]
#[case::field_operator(json!({"x": {"$regex": "a"}}))]
#[case::top_level_operator(json!({"$where": "true"}))]
#[case::empty_or(json!({"$or": []}))]
fn unknown_or_malformed_operators_are_rejected(#[case] filter: serde_json::Value) {
    let error = matches_filter(&sample(), &doc(filter)).expect_err("invalid filter");
    assert_eq!(error.code, BAD_VALUE);
}

#[test]
fn sort_orders_by_each_key_in_turn() {
    let mut documents = vec![
        doc(json!({"_id": 1, "x": 2, "y": 1})),
        doc(json!({"_id": 2, "x": 1, "y": 5})),
        doc(json!({"_id": 3, "x": 2, "y": 0})),
    ];
    sort_documents(&mut documents, &doc(json!({"x": -1, "y": 1}))).expect("valid sort");
    let ids: Vec<_> = documents
        .iter()
        .filter_map(|document| document.get_i64("_id"))
        .collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[test]
fn sort_rejects_invalid_direction() {
    let mut documents = vec![sample()];
    assert!(sort_documents(&mut documents, &doc(json!({"x": 2}))).is_err());
}

#[rstest]
#[case::inclusion(json!({"x": 1}), json!({"_id": 1, "x": 2}))]
#[case::inclusion_without_id(json!({"_id": 0, "x": 1}), json!({"x": 2}))]
#[case::exclusion(json!({"tags": 0, "a": 0}), json!({"_id": 1, "x": 2}))]
#[case::nested_inclusion(json!({"a.b": 1}), json!({"_id": 1, "a": {"b": 1}}))]
fn projections_select_fields(
    #[case] projection: serde_json::Value,
    #[case] expected: serde_json::Value,
) {
    assert_eq!(project(&sample(), &doc(projection)), doc(expected));
}

#[rstest]
#[case::null_before_numbers(Value::Null, Value::Int32(0), Ordering::Less)]
#[case::numbers_before_strings(Value::Int64(9), Value::from("0"), Ordering::Less)]
#[case::numeric_across_types(Value::Double(2.0), Value::Int32(2), Ordering::Equal)]
#[case::strings_lexically(Value::from("b"), Value::from("a"), Ordering::Greater)]
fn values_follow_server_comparison_order(
    #[case] left: Value,
    #[case] right: Value,
    #[case] expected: Ordering,
) {
    assert_eq!(compare_values(&left, &right), expected);
}
