//! Tests for Extended JSON conversion.

use rstest::rstest;
use serde_json::json;

use crate::{
    Binary, Decimal128, ExtJsonError, ObjectId, Value, document_from_json, from_json, to_json,
};

#[rstest]
#[case::small_int(json!(3), Value::Int32(3))]
#[case::wide_int(json!(5_000_000_000_i64), Value::Int64(5_000_000_000))]
#[case::float(json!(1.5), Value::Double(1.5))]
#[case::number_int(json!({"$numberInt": "7"}), Value::Int32(7))]
#[case::number_long(json!({"$numberLong": "3"}), Value::Int64(3))]
#[case::number_double(json!({"$numberDouble": "2.5"}), Value::Double(2.5))]
#[case::number_decimal(json!({"$numberDecimal": "1.10"}), Value::Decimal128(Decimal128::new("1.10")))]
#[case::date_long(json!({"$date": {"$numberLong": "1000"}}), Value::DateTime(1000))]
#[case::date_plain(json!({"$date": 42}), Value::DateTime(42))]
fn parses_numbers_and_wrappers(#[case] input: serde_json::Value, #[case] expected: Value) {
    assert_eq!(from_json(&input).expect("valid extended JSON"), expected);
}

#[test]
fn parses_infinity() {
    let value = from_json(&json!({"$numberDouble": "-Infinity"})).expect("valid");
    assert_eq!(value, Value::Double(f64::NEG_INFINITY));
}

#[test]
fn parses_binary_and_object_id() {
    let binary = from_json(&json!({"$binary": {"base64": "AQI=", "subType": "04"}}))
        .expect("valid binary");
    assert_eq!(binary, Value::Binary(Binary::new(Binary::UUID, vec![1, 2])));

    let id = from_json(&json!({"$oid": "000000000000000000000001"})).expect("valid oid");
    let mut bytes = [0_u8; 12];
    bytes[11] = 1;
    assert_eq!(id, Value::ObjectId(ObjectId::from_bytes(bytes)));
}

#[test]
fn operator_keys_stay_documents() {
    let value = from_json(&json!({"$$lte": 2})).expect("valid");
    let document = value.as_document().expect("operator object is a document");
    assert_eq!(document.get("$$lte"), Some(&Value::Int32(2)));
}

#[test]
fn preserves_key_order() {
    let document = document_from_json(&json!({"insert": "coll", "documents": [], "ordered": true}))
        .expect("valid");
    let keys: Vec<_> = document.keys().collect();
    assert_eq!(keys, vec!["insert", "documents", "ordered"]);
}

#[rstest]
#[case::bad_long(json!({"$numberLong": "abc"}), "$numberLong")]
#[case::bad_oid(json!({"$oid": "12"}), "$oid")]
#[case::non_string(json!({"$numberInt": 1}), "$numberInt")]
fn rejects_malformed_wrappers(#[case] input: serde_json::Value, #[case] wrapper: &str) {
    let error = from_json(&input).expect_err("malformed wrapper");
    assert!(
        matches!(&error, ExtJsonError::InvalidWrapper { wrapper: found, .. } if found == wrapper),
        "unexpected error: {error}"
    );
}

#[test]
fn document_from_json_rejects_arrays() {
    let error = document_from_json(&json!([1])).expect_err("array is not a document");
    assert_eq!(error, ExtJsonError::ExpectedObject { found: "array" });
}

#[test]
fn renders_relaxed_form() {
    let value = from_json(&json!({
        "a": {"$numberLong": "9"},
        "b": {"$numberDouble": "NaN"},
        "c": {"$binary": {"base64": "AQI=", "subType": "00"}}
    }))
    .expect("valid");
    assert_eq!(
        to_json(&value),
        json!({
            "a": 9,
            "b": {"$numberDouble": "NaN"},
            "c": {"$binary": {"base64": "AQI=", "subType": "00"}}
        })
    );
}
