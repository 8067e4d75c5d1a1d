//! Tests for outcome, event and collection expectations.

use std::sync::Arc;

use insta::assert_snapshot;
use rstest::rstest;
use serde_json::json;
use utr_client::driver::Database;
use utr_client::memory::MemoryClientFactory;
use utr_client::{ClientError, ClientEvent, CommandOptions, CommandStarted};
use utr_matcher::Matcher;
use utr_model::{CollectionData, Document, ExpectedEventsForClient, Operation, Value};

use super::{doc, internal_client, value};
use crate::error::CaseFailure;
use crate::executor::OperationOutcome;
use crate::expectations::{UNEXPECTED_SUCCESS, check_events, check_operation, check_outcome};
use crate::recorder::EventRecorder;

fn operation(json: serde_json::Value) -> Operation {
    serde_json::from_value(json).expect("valid operation")
}

fn check(
    operation_json: serde_json::Value,
    outcome: OperationOutcome,
) -> Result<Option<Value>, CaseFailure> {
    check_operation(&operation(operation_json), outcome, &Matcher::standalone())
}

fn failure_message(result: Result<impl std::fmt::Debug, CaseFailure>) -> String {
    match result {
        Err(CaseFailure::Assertion(mismatch)) => mismatch.to_string(),
        other => panic!("expected an assertion failure, got {other:?}"),
    }
}

fn retryable_error() -> ClientError {
    ClientError::from_reply(&doc(json!({
        "ok": 0,
        "code": 91,
        "codeName": "ShutdownInProgress",
        "errmsg": "Failing command via 'failCommand' failpoint",
        "errorLabels": ["RetryableWriteError"]
    })))
}

#[rstest]
fn success_when_failure_was_expected_fails_the_case() {
    let result = check(
        json!({"name": "insertOne", "object": "c", "expectError": {"isError": true}}),
        OperationOutcome::Success(value(json!({"insertedId": 1}))),
    );
    assert_eq!(failure_message(result), format!("expectError: {UNEXPECTED_SUCCESS}"));
}

#[rstest]
fn unexpected_failures_are_operation_errors() {
    let result = check(
        json!({"name": "insertOne", "object": "c"}),
        OperationOutcome::Failure(retryable_error()),
    );
    assert!(matches!(result, Err(CaseFailure::Operation(error)) if error.operation == "insertOne"));
}

#[rstest]
fn ignored_results_and_errors_always_pass() {
    let result = check(
        json!({"name": "insertOne", "object": "c", "ignoreResultAndError": true,
               "expectResult": {"never": "checked"}}),
        OperationOutcome::Failure(ClientError::network("reset")),
    );
    assert!(matches!(result, Ok(None)));
}

#[rstest]
fn successful_results_are_returned_for_saving() {
    let result = check(
        json!({"name": "countDocuments", "object": "c", "expectResult": 2}),
        OperationOutcome::Success(Value::Int64(2)),
    );
    assert_eq!(result.ok(), Some(Some(Value::Int64(2))));
}

#[rstest]
#[case(json!({"errorCode": 91}))]
#[case(json!({"errorCodeName": "ShutdownInProgress"}))]
#[case(json!({"errorContains": "FAILCOMMAND"}))]
#[case(json!({"errorLabelsContain": ["RetryableWriteError"], "errorLabelsOmit": ["TransientTransactionError"]}))]
#[case(json!({"isClientError": false, "isTimeoutError": false}))]
fn matching_errors_pass(#[case] expected: serde_json::Value) {
    let result = check(
        json!({"name": "insertOne", "object": "c", "expectError": expected}),
        OperationOutcome::Failure(retryable_error()),
    );
    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[rstest]
#[case(json!({"errorCode": 11000}))]
#[case(json!({"errorContains": "duplicate"}))]
#[case(json!({"errorLabelsOmit": ["RetryableWriteError"]}))]
#[case(json!({"isClientError": true}))]
#[case(json!({"expectResult": {"insertedIds": {}}}))]
fn diverging_errors_fail(#[case] expected: serde_json::Value) {
    let result = check(
        json!({"name": "insertOne", "object": "c", "expectError": expected}),
        OperationOutcome::Failure(retryable_error()),
    );
    assert!(matches!(result, Err(CaseFailure::Assertion(_))), "unexpected result: {result:?}");
}

#[rstest]
fn partial_results_are_matched() {
    let error = ClientError::server(11000, "DuplicateKey", "duplicate key")
        .with_partial_result(doc(json!({"insertedIds": {"0": 4}})));
    let result = check(
        json!({"name": "insertMany", "object": "c",
               "expectError": {"expectResult": {"insertedIds": {"$$unsetOrMatches": {"0": 4}}}}}),
        OperationOutcome::Failure(error),
    );
    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[rstest]
fn result_mismatch_diagnostic() {
    let result = check(
        json!({"name": "insertOne", "object": "c", "expectResult": {"insertedId": 2}}),
        OperationOutcome::Success(value(json!({"insertedId": 1}))),
    );
    assert_snapshot!(
        failure_message(result),
        @"expectResult: at $.insertedId: values differ (expected 2, actual 1)"
    );
}

#[rstest]
fn unknown_operators_are_specification_errors() {
    let result = check(
        json!({"name": "find", "object": "c", "expectResult": {"$$frobnicate": 1}}),
        OperationOutcome::Success(Value::Null),
    );
    assert!(matches!(result, Err(CaseFailure::Specification(_))));
}

fn started(command: Document) -> ClientEvent {
    let command_name = command
        .first()
        .map(|(name, _)| name.to_owned())
        .unwrap_or_default();
    ClientEvent::CommandStarted(CommandStarted {
        command_name,
        database_name: "db".to_owned(),
        command,
        request_id: 1,
        connection_id: 1,
    })
}

fn expected_events(json: serde_json::Value) -> Vec<ExpectedEventsForClient> {
    serde_json::from_value(json).expect("valid expectEvents")
}

#[rstest]
fn events_are_compared_since_the_mark() {
    let recorder = EventRecorder::new();
    recorder.record("client0", started(doc(json!({"ping": 1}))));
    let mark = recorder.mark();
    recorder.record("client0", started(doc(json!({"insert": "coll", "documents": [{"_id": 1, "x": 2}]}))));

    let expectations = expected_events(json!([{
        "client": "client0",
        "events": [{"commandStartedEvent": {
            "command": {"insert": "coll", "documents": [{"_id": 1, "x": {"$$lte": 2}}]},
            "commandName": "insert",
            "databaseName": "db"
        }}]
    }]));

    assert!(check_events(&expectations, &recorder, mark, &Matcher::standalone()).is_ok());
}

#[rstest]
fn extra_events_fail_unless_ignored() {
    let recorder = EventRecorder::new();
    let mark = recorder.mark();
    recorder.record("client0", started(doc(json!({"find": "coll"}))));
    recorder.record("client0", started(doc(json!({"getMore": 1}))));
    let strict = expected_events(json!([{
        "client": "client0",
        "events": [{"commandStartedEvent": {"commandName": "find"}}]
    }]));
    let lenient = expected_events(json!([{
        "client": "client0",
        "ignoreExtraEvents": true,
        "events": [{"commandStartedEvent": {"commandName": "find"}}]
    }]));

    assert_snapshot!(
        failure_message(check_events(&strict, &recorder, mark, &Matcher::standalone())),
        @"expectEvents[client0]: expected 1 command events, got 2 [commandStartedEvent, commandStartedEvent]"
    );
    assert!(check_events(&lenient, &recorder, mark, &Matcher::standalone()).is_ok());
}

#[rstest]
fn event_kinds_must_match_in_order() {
    let recorder = EventRecorder::new();
    let mark = recorder.mark();
    recorder.record("client0", started(doc(json!({"find": "coll"}))));
    let expectations = expected_events(json!([{
        "client": "client0",
        "events": [{"commandSucceededEvent": {"commandName": "find"}}]
    }]));
    assert_snapshot!(
        failure_message(check_events(&expectations, &recorder, mark, &Matcher::standalone())),
        @"expectEvents[client0]: event 0: expected commandSucceededEvent, got commandStartedEvent"
    );
}

fn outcome(documents: serde_json::Value) -> Vec<CollectionData> {
    serde_json::from_value(json!([{
        "collectionName": "coll",
        "databaseName": "db",
        "documents": documents
    }]))
    .expect("valid outcome")
}

#[rstest]
fn outcome_is_read_in_id_order_and_matched_exactly() {
    let factory = MemoryClientFactory::default();
    let internal = internal_client(&factory);
    Database::new(Arc::clone(&internal), "db")
        .collection("coll")
        .insert_many(
            vec![doc(json!({"_id": 2, "x": 1})), doc(json!({"_id": 1}))],
            true,
            &CommandOptions::default(),
        )
        .expect("seed");

    let matcher = Matcher::standalone();
    assert!(check_outcome(&outcome(json!([{"_id": 1}, {"_id": 2, "x": 1}])), &internal, &matcher).is_ok());
    assert_snapshot!(
        failure_message(check_outcome(&outcome(json!([{"_id": 1}, {"_id": 2}])), &internal, &matcher)),
        @"outcome db.coll: at $[1].x: unexpected key (expected null, actual 1)"
    );
}
