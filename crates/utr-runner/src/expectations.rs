//! Checks of operation outcomes, recorded events and final collection state.

use std::sync::Arc;

use utr_client::driver::{Database, FindOptions};
use utr_client::{ClientError, CommandOptions, DatabaseClient};
use utr_matcher::{MappingMode, MatchPath, Matcher};
use utr_model::{
    CollectionData, Document, ExpectedError, ExpectedEventsForClient, Operation, Value,
};

use crate::error::{AssertionMismatch, CaseFailure, OperationError, classify_match};
use crate::executor::OperationOutcome;
use crate::recorder::{EventMark, EventRecorder};

/// Diagnostic reported when an operation expected to fail succeeded.
pub const UNEXPECTED_SUCCESS: &str = "expected failure, got success";

/// Checks an operation's outcome against its `expectError`, `expectResult`
/// and `ignoreResultAndError` settings.
///
/// Returns the result value when the operation succeeded, for
/// `saveResultAsEntity`.
pub(crate) fn check_operation(
    operation: &Operation,
    outcome: OperationOutcome,
    matcher: &Matcher<'_>,
) -> Result<Option<Value>, CaseFailure> {
    if operation.ignore_result_and_error {
        return Ok(match outcome {
            OperationOutcome::Success(value) => Some(value),
            OperationOutcome::Failure(_) => None,
        });
    }
    match (outcome, &operation.expect_error) {
        (OperationOutcome::Success(_), Some(_)) => Err(CaseFailure::Assertion(
            AssertionMismatch::new("expectError", UNEXPECTED_SUCCESS),
        )),
        (OperationOutcome::Failure(error), Some(expected)) => {
            check_error(expected, &error, matcher)?;
            Ok(None)
        }
        (OperationOutcome::Failure(error), None) => Err(CaseFailure::Operation(
            OperationError::new(operation.name.as_str(), error),
        )),
        (OperationOutcome::Success(value), None) => {
            if let Some(expected) = &operation.expect_result {
                classify_match("expectResult", matcher.check(expected, &value))?;
            }
            Ok(Some(value))
        }
    }
}

fn error_mismatch(message: impl Into<String>) -> CaseFailure {
    CaseFailure::Assertion(AssertionMismatch::new("expectError", message))
}

fn check_flag(
    expected: Option<bool>,
    actual: bool,
    what: &str,
    error: &ClientError,
) -> Result<(), CaseFailure> {
    match expected {
        Some(wanted) if wanted != actual => {
            let negation = if wanted { "" } else { "no " };
            Err(error_mismatch(format!("expected {negation}{what}, got: {error}")))
        }
        _ => Ok(()),
    }
}

/// Checks a client failure against an `expectError` block.
fn check_error(
    expected: &ExpectedError,
    error: &ClientError,
    matcher: &Matcher<'_>,
) -> Result<(), CaseFailure> {
    check_flag(
        expected.is_client_error,
        error.is_client_error(),
        "client error",
        error,
    )?;
    check_flag(
        expected.is_timeout_error,
        error.is_timeout(),
        "timeout error",
        error,
    )?;
    if let Some(needle) = &expected.error_contains
        && !error
            .to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    {
        return Err(error_mismatch(format!(
            "error does not contain '{needle}': {error}"
        )));
    }
    if let Some(code) = expected.error_code
        && error.code() != Some(code)
    {
        return Err(error_mismatch(format!(
            "expected error code {code}, got: {error}"
        )));
    }
    if let Some(name) = &expected.error_code_name
        && error.code_name() != Some(name.as_str())
    {
        return Err(error_mismatch(format!(
            "expected error code name {name}, got: {error}"
        )));
    }
    let labels = error.labels();
    if let Some(missing) = expected
        .error_labels_contain
        .iter()
        .find(|label| !labels.contains(label))
    {
        return Err(error_mismatch(format!(
            "error lacks label {missing}: {error}"
        )));
    }
    if let Some(present) = expected
        .error_labels_omit
        .iter()
        .find(|label| labels.contains(label))
    {
        return Err(error_mismatch(format!(
            "error carries label {present}: {error}"
        )));
    }
    if let Some(expected_result) = &expected.expect_result {
        let partial = error
            .partial_result()
            .ok_or_else(|| error_mismatch(format!("error carries no partial result: {error}")))?;
        classify_match(
            "expectError.expectResult",
            matcher.check(expected_result, &Value::Document(partial.clone())),
        )?;
    }
    Ok(())
}

/// Compares each client's events recorded since `mark` with the expected
/// sequence.
pub(crate) fn check_events(
    expectations: &[ExpectedEventsForClient],
    recorder: &EventRecorder,
    mark: EventMark,
    matcher: &Matcher<'_>,
) -> Result<(), CaseFailure> {
    for expected in expectations {
        let context = format!("expectEvents[{}]", expected.client);
        let actual = recorder.events_since(&expected.client, mark, expected.event_type);
        let count_matches = if expected.ignore_extra_events {
            actual.len() >= expected.events.len()
        } else {
            actual.len() == expected.events.len()
        };
        if !count_matches {
            let kinds: Vec<&str> = actual
                .iter()
                .map(|recorded| recorded.event.kind().as_str())
                .collect();
            return Err(CaseFailure::Assertion(AssertionMismatch::new(
                context,
                format!(
                    "expected {} {} events, got {} [{}]",
                    expected.events.len(),
                    expected.event_type,
                    actual.len(),
                    kinds.join(", ")
                ),
            )));
        }
        for (index, (wanted, recorded)) in expected.events.iter().zip(&actual).enumerate() {
            let kind = recorded.event.kind();
            if wanted.kind != kind {
                return Err(CaseFailure::Assertion(AssertionMismatch::new(
                    context,
                    format!(
                        "event {index}: expected {}, got {}",
                        wanted.kind.as_str(),
                        kind.as_str()
                    ),
                )));
            }
            classify_match(
                &format!("{context} event {index} ({})", kind.as_str()),
                matcher.check(
                    &Value::Document(wanted.fields.clone()),
                    &Value::Document(recorded.event.to_document()),
                ),
            )?;
        }
    }
    Ok(())
}

/// Compares collection contents, read through the internal client in `_id`
/// order, with the expected documents. Extra fields are mismatches.
pub(crate) fn check_outcome(
    outcome: &[CollectionData],
    internal_client: &Arc<dyn DatabaseClient>,
    matcher: &Matcher<'_>,
) -> Result<(), CaseFailure> {
    for data in outcome {
        let collection = Database::new(Arc::clone(internal_client), data.database_name.as_str())
            .collection(data.collection_name.as_str());
        let mut sort = Document::new();
        sort.insert("_id", 1);
        let find = FindOptions {
            sort: Some(sort),
            ..FindOptions::default()
        };
        let actual = collection
            .find(&find, &CommandOptions::default())
            .map_err(|error| CaseFailure::Operation(OperationError::new("outcome", error)))?;
        let expected = Value::Array(data.documents.iter().cloned().map(Value::Document).collect());
        classify_match(
            &format!("outcome {}", collection.namespace()),
            matcher.check_at(
                &expected,
                Some(&Value::Array(actual.into_iter().map(Value::Document).collect())),
                &MatchPath::root(),
                MappingMode::Exact,
            ),
        )?;
    }
    Ok(())
}
