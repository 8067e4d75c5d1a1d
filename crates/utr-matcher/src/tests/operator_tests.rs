//! Tests for the built-in operators.

use std::collections::HashMap;

use rstest::{fixture, rstest};
use serde_json::json;
use utr_model::{Binary, Document, Value};

use super::value;
use crate::{EntityLookup, MatchError, Matcher, OperatorCall, OperatorTable};

#[derive(Default)]
struct StubEntities {
    values: HashMap<String, Value>,
    sessions: HashMap<String, Document>,
}

impl EntityLookup for StubEntities {
    fn entity_value(&self, id: &str) -> Option<Value> {
        self.values.get(id).cloned()
    }

    fn session_lsid(&self, id: &str) -> Option<Document> {
        self.sessions.get(id).cloned()
    }
}

fn lsid(byte: u8) -> Document {
    let mut document = Document::new();
    document.insert("id", Binary::new(Binary::UUID, vec![byte; 16]));
    document
}

#[fixture]
fn entities() -> StubEntities {
    let mut stub = StubEntities::default();
    stub.values.insert("savedId".to_owned(), Value::Int32(42));
    stub.sessions.insert("session0".to_owned(), lsid(1));
    stub
}

fn check(expected: serde_json::Value, actual: serde_json::Value) -> bool {
    Matcher::standalone().matches(&value(expected), &value(actual))
}

#[rstest]
#[case::one(json!(1), true)]
#[case::two(json!(2), true)]
#[case::long_two(json!({"$numberLong": "2"}), true)]
#[case::double_below(json!(1.5), true)]
#[case::three(json!(3), false)]
#[case::long_three(json!({"$numberLong": "3"}), false)]
#[case::double_above(json!(2.5), false)]
#[case::not_a_number(json!("1"), false)]
fn lte_compares_every_numeric_type(#[case] actual: serde_json::Value, #[case] outcome: bool) {
    assert_eq!(check(json!({"$$lte": 2}), actual), outcome);
}

#[test]
fn lte_on_absent_key_fails() {
    assert!(!check(json!({"x": {"$$lte": 2}}), json!({})));
}

#[rstest]
#[case::present_required(json!({"a": {"$$exists": true}}), json!({"a": null}), true)]
#[case::absent_required(json!({"a": {"$$exists": true}}), json!({}), false)]
#[case::absent_forbidden(json!({"a": {"$$exists": false}}), json!({}), true)]
#[case::present_forbidden(json!({"a": {"$$exists": false}}), json!({"a": 1}), false)]
fn exists_checks_presence(
    #[case] expected: serde_json::Value,
    #[case] actual: serde_json::Value,
    #[case] outcome: bool,
) {
    assert_eq!(check(expected, actual), outcome);
}

#[rstest]
#[case::int("int", json!(1), true)]
#[case::long_is_not_int("int", json!({"$numberLong": "1"}), false)]
#[case::number_alias_int("number", json!(1), true)]
#[case::number_alias_double("number", json!(1.5), true)]
#[case::number_alias_decimal("number", json!({"$numberDecimal": "1"}), true)]
#[case::number_alias_string("number", json!("1"), false)]
#[case::object("object", json!({}), true)]
#[case::bin_data("binData", json!({"$binary": {"base64": "AA==", "subType": "00"}}), true)]
fn type_checks_type_tags(#[case] name: &str, #[case] actual: serde_json::Value, #[case] outcome: bool) {
    assert_eq!(check(json!({"$$type": name}), actual), outcome);
}

#[test]
fn type_accepts_a_list_of_names() {
    assert!(check(json!({"$$type": ["string", "long"]}), json!({"$numberLong": "5"})));
    assert!(!check(json!({"$$type": ["string", "long"]}), json!(true)));
}

#[rstest]
#[case::absent(json!({}), true)]
#[case::matching(json!({"insertedId": 1}), true)]
#[case::differing(json!({"insertedId": 2}), false)]
fn unset_or_matches_accepts_absence(#[case] actual: serde_json::Value, #[case] outcome: bool) {
    assert_eq!(
        check(json!({"insertedId": {"$$unsetOrMatches": 1}}), actual),
        outcome
    );
}

#[rstest]
fn matches_entity_uses_saved_value(entities: StubEntities) {
    let matcher = Matcher::new(&entities);
    let expected = value(json!({"_id": {"$$matchesEntity": "savedId"}}));
    assert!(matcher.matches(&expected, &value(json!({"_id": 42}))));
    assert!(!matcher.matches(&expected, &value(json!({"_id": 43}))));
}

#[rstest]
fn matches_entity_reports_unknown_ids(entities: StubEntities) {
    let matcher = Matcher::new(&entities);
    let error = matcher
        .check(&value(json!({"$$matchesEntity": "missing"})), &value(json!(1)))
        .expect_err("unknown entity");
    assert!(matches!(&error, MatchError::UnknownEntity { id, .. } if id == "missing"));
}

#[rstest]
fn session_lsid_compares_identifier(entities: StubEntities) {
    let matcher = Matcher::new(&entities);
    let expected = value(json!({"lsid": {"$$sessionLsid": "session0"}}));
    let mut same = Document::new();
    same.insert("lsid", lsid(1));
    let mut other = Document::new();
    other.insert("lsid", lsid(2));
    assert!(matcher.matches(&expected, &Value::Document(same)));
    assert!(!matcher.matches(&expected, &Value::Document(other)));
}

#[test]
fn matches_hex_bytes_compares_binary() {
    let actual = json!({"$binary": {"base64": "ESIz", "subType": "00"}});
    assert!(check(json!({"$$matchesHexBytes": "112233"}), actual.clone()));
    assert!(!check(json!({"$$matchesHexBytes": "1122"}), actual));
}

#[test]
fn matches_hex_bytes_rejects_bad_hex() {
    let error = Matcher::standalone()
        .check(&value(json!({"$$matchesHexBytes": "zz"})), &value(json!(1)))
        .expect_err("invalid operand");
    assert!(error.is_specification_error());
}

#[test]
fn match_as_document_parses_json_strings() {
    let expected = json!({"$$matchAsDocument": {"x": {"$$lte": 2}}});
    assert!(check(expected.clone(), json!("{\"x\": 1, \"y\": 9}")));
    assert!(!check(expected.clone(), json!("{\"x\": 3}")));
    assert!(!check(expected, json!("not json")));
}

#[rstest]
#[case::exact_keys(json!({"a": 1}), true)]
#[case::extra_key(json!({"a": 1, "b": 2}), false)]
fn exact_forbids_extra_keys(#[case] actual: serde_json::Value, #[case] outcome: bool) {
    assert_eq!(check(json!({"$$exact": {"a": 1}}), actual), outcome);
}

#[test]
fn match_as_root_relaxes_exact_mappings() {
    let expected = json!({"$$exact": {"a": 1, "b": {"$$matchAsRoot": {"c": 1}}}});
    assert!(check(expected.clone(), json!({"a": 1, "b": {"c": 1, "d": 2}})));
    assert!(!check(expected, json!({"a": 1, "b": {"c": 1}, "e": 3})));
}

#[rstest]
#[case::reordered(json!([2, 1, 3]), true)]
#[case::same_order(json!([1, 2, 3]), true)]
#[case::missing_element(json!([1, 2, 2]), false)]
#[case::different_length(json!([1, 2]), false)]
fn unordered_ignores_order(#[case] actual: serde_json::Value, #[case] outcome: bool) {
    assert_eq!(check(json!({"$$unordered": [1, 2, 3]}), actual), outcome);
}

#[test]
fn unordered_assigns_distinct_elements() {
    // The permissive first pattern fits both elements; only one assignment works.
    let expected = json!({"$$unordered": [{"a": 1}, {"a": 1, "b": 2}]});
    assert!(check(expected.clone(), json!([{"a": 1, "b": 2}, {"a": 1}])));
    assert!(!check(expected, json!([{"a": 1}, {"a": 1}])));
}

fn always_even(_matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let actual = call.require_actual()?;
    match actual.as_i64() {
        Some(number) if number.rem_euclid(2) == 0 => Ok(()),
        _ => Err(call.mismatch("not even")),
    }
}

#[test]
fn registered_operators_extend_the_language() {
    let mut table = OperatorTable::builtin();
    table.register("$$even", always_even);
    let matcher = Matcher::with_operators(&crate::NoEntities, table);
    assert!(matcher.matches(&value(json!({"$$even": true})), &value(json!(4))));
    assert!(!matcher.matches(&value(json!({"$$even": true})), &value(json!(5))));
}
