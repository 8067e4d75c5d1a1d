//! Tests for update operators, replacements and upsert seeds.

use rstest::rstest;
use serde_json::json;
use utr_model::Value;

use super::doc;
use crate::codes::{FAILED_TO_PARSE, IMMUTABLE_FIELD, PATH_NOT_VIABLE};
use crate::memory::update::{add_numbers, apply_update, upsert_seed};

#[rstest]
#[case::set_existing(json!({"$set": {"x": 5}}), json!({"_id": 1, "x": 5}))]
#[case::set_nested_creates_parents(
    json!({"$set": {"a.b": 1}}),
    json!({"_id": 1, "x": 1, "a": {"b": 1}})
)]
#[case::unset(json!({"$unset": {"x": ""}}), json!({"_id": 1}))]
#[case::increment(json!({"$inc": {"x": 2}}), json!({"_id": 1, "x": 3}))]
#[case::increment_missing(json!({"$inc": {"y": 1}}), json!({"_id": 1, "x": 1, "y": 1}))]
#[case::push_creates_array(json!({"$push": {"tags": "a"}}), json!({"_id": 1, "x": 1, "tags": ["a"]}))]
#[case::set_on_insert_ignored(json!({"$setOnInsert": {"y": 1}}), json!({"_id": 1, "x": 1}))]
#[case::replacement_keeps_id(json!({"y": 2}), json!({"_id": 1, "y": 2}))]
fn updates_transform_documents(
    #[case] update: serde_json::Value,
    #[case] expected: serde_json::Value,
) {
    let original = doc(json!({"_id": 1, "x": 1}));
    let updated = apply_update(&original, &doc(update), false).expect("valid update");
    assert_eq!(updated, doc(expected));
}

#[rstest]
#[case::set_id(json!({"$set": {"_id": 2}}), IMMUTABLE_FIELD)]
#[case::replace_id(json!({"_id": 2, "x": 1}), IMMUTABLE_FIELD)]
#[case::unknown_modifier(json!({"$rename": {"x": "y"}}), FAILED_TO_PARSE)]
#[case::scalar_parent(json!({"$set": {"x.y": 1}}), PATH_NOT_VIABLE)]
fn invalid_updates_report_server_codes(#[case] update: serde_json::Value, #[case] code: i32) {
    let original = doc(json!({"_id": 1, "x": 1}));
    let error = apply_update(&original, &doc(update), false).expect_err("update must fail");
    assert_eq!(error.code, code);
}

#[rstest]
#[case::int_overflow_promotes(Value::Int32(i32::MAX), Value::Int32(1), Value::Int64(2_147_483_648))]
#[case::int_and_long(Value::Int32(1), Value::Int64(2), Value::Int64(3))]
#[case::double_wins(Value::Int32(1), Value::Double(0.5), Value::Double(1.5))]
fn numeric_addition_promotes_types(
    #[case] left: Value,
    #[case] right: Value,
    #[case] expected: Value,
) {
    assert_eq!(add_numbers(&left, &right), Some(expected));
}

#[test]
fn long_overflow_is_rejected() {
    assert_eq!(add_numbers(&Value::Int64(i64::MAX), &Value::Int32(1)), None);
}

#[test]
fn upsert_seed_combines_filter_equalities_and_update() {
    let filter = doc(json!({"_id": 5, "x": {"$gt": 1}}));
    let update = doc(json!({"$set": {"y": 1}, "$setOnInsert": {"z": 2}}));
    let seed = upsert_seed(&filter, &update).expect("valid upsert");
    assert_eq!(seed, doc(json!({"_id": 5, "y": 1, "z": 2})));
}

#[test]
fn upsert_seed_with_replacement_takes_filter_id() {
    let seed = upsert_seed(&doc(json!({"_id": 7})), &doc(json!({"x": 1}))).expect("valid upsert");
    assert_eq!(seed, doc(json!({"_id": 7, "x": 1})));
}
