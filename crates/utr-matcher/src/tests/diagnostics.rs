//! Snapshot tests for mismatch diagnostics.

use insta::assert_snapshot;
use serde_json::json;

use super::value;
use crate::Matcher;

fn diagnostic(expected: serde_json::Value, actual: serde_json::Value) -> String {
    Matcher::standalone()
        .check(&value(expected), &value(actual))
        .expect_err("mismatch expected")
        .to_string()
}

#[test]
fn lte_diagnostic() {
    assert_snapshot!(
        diagnostic(json!({"x": {"$$lte": 2}}), json!({"_id": 1, "x": 3})),
        @r#"mismatch at $.x: 3 is not less than or equal to 2 (expected {"$$lte":2}, actual 3)"#
    );
}

#[test]
fn absent_key_diagnostic() {
    assert_snapshot!(
        diagnostic(json!({"a": {"b": 1}}), json!({"a": {}})),
        @"mismatch at $.a.b: key is absent (expected 1, actual <absent>)"
    );
}

#[test]
fn type_diagnostic() {
    assert_snapshot!(
        diagnostic(json!({"n": "1"}), json!({"n": 1})),
        @r#"mismatch at $.n: expected type string, found int (expected "1", actual 1)"#
    );
}
