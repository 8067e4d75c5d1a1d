//! Operations addressed to the interpreter itself (`object: testRunner`).

use std::sync::Arc;

use tracing::{debug, warn};
use utr_client::driver::Database;
use utr_client::{ClientError, CommandOptions, DatabaseClient};
use utr_model::{Document, Value};

use super::arguments::Arguments;
use super::{EXECUTOR_TARGET, HandlerResult, OperationOutcome, RoutingTable};
use crate::error::{AssertionMismatch, CaseFailure};
use crate::recorder::EventMark;
use crate::registry::EntityRegistry;

/// What `testRunner` handlers can reach.
pub(crate) struct TestRunnerContext<'c> {
    pub(crate) registry: &'c EntityRegistry,
    pub(crate) internal_client: &'c Arc<dyn DatabaseClient>,
    pub(crate) fail_points: &'c mut EnabledFailPoints,
}

type RunnerHandler = fn(&mut TestRunnerContext<'_>, &mut Arguments) -> HandlerResult;

pub(crate) const OPERATIONS: RoutingTable<RunnerHandler> = RoutingTable {
    object: "testRunner",
    operations: &[
        ("failPoint", fail_point),
        ("assertCollectionExists", assert_collection_exists),
        ("assertCollectionNotExists", assert_collection_not_exists),
        ("assertSameLsidOnLastTwoCommands", assert_same_lsid),
        ("assertDifferentLsidOnLastTwoCommands", assert_different_lsid),
        ("assertSessionNotDirty", assert_session_not_dirty),
        ("assertSessionDirty", assert_session_dirty),
        (
            "assertNumberConnectionsCheckedOut",
            assert_number_connections_checked_out,
        ),
    ],
};

#[derive(Debug)]
struct EnabledFailPoint {
    client: Arc<dyn DatabaseClient>,
    name: String,
}

/// Fail points enabled by `failPoint` operations, disabled after the case.
#[derive(Debug, Default)]
pub struct EnabledFailPoints {
    enabled: Vec<EnabledFailPoint>,
}

impl EnabledFailPoints {
    /// No fail points enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fail points still enabled.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.enabled.len()
    }

    /// Whether no fail point is enabled.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Turns every fail point off, most recent first.
    ///
    /// Failures are logged and returned; the remaining fail points are still
    /// disabled.
    pub fn disable_all(&mut self) -> Vec<ClientError> {
        let mut failures = Vec::new();
        while let Some(fail_point) = self.enabled.pop() {
            let mut command = Document::new();
            command.insert("configureFailPoint", fail_point.name.as_str());
            command.insert("mode", "off");
            let disabled = fail_point
                .client
                .run_command("admin", command, &CommandOptions::default());
            if let Err(error) = disabled {
                warn!(
                    target: EXECUTOR_TARGET,
                    fail_point = fail_point.name.as_str(),
                    error = %error,
                    "failed to disable fail point"
                );
                failures.push(error);
            }
        }
        failures
    }
}

fn mismatch(operation: &str, message: impl Into<String>) -> CaseFailure {
    CaseFailure::Assertion(AssertionMismatch::new(operation, message))
}

fn fail_point(context: &mut TestRunnerContext<'_>, arguments: &mut Arguments) -> HandlerResult {
    let client_id = arguments.string("client")?;
    let command = arguments.document("failPoint")?;
    arguments.finish()?;
    let name = command
        .get_str("configureFailPoint")
        .map(str::to_owned)
        .ok_or_else(|| arguments.invalid("'failPoint' must name the fail point"))?;
    let client = Arc::clone(&context.registry.client(&client_id)?.client);
    match client.run_command("admin", command, &CommandOptions::default()) {
        Ok(_) => {
            debug!(
                target: EXECUTOR_TARGET,
                client = client_id.as_str(),
                fail_point = name.as_str(),
                "enabled fail point"
            );
            context
                .fail_points
                .enabled
                .push(EnabledFailPoint { client, name });
            Ok(OperationOutcome::Success(Value::Null))
        }
        Err(error) => Ok(OperationOutcome::Failure(error)),
    }
}

fn collection_exists(
    context: &TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> Result<Result<(String, bool), ClientError>, CaseFailure> {
    let database_name = arguments.string("databaseName")?;
    let collection_name = arguments.string("collectionName")?;
    arguments.finish()?;
    let database = Database::new(Arc::clone(context.internal_client), database_name.as_str());
    Ok(database
        .list_collection_names(&CommandOptions::default())
        .map(|names| {
            let exists = names.contains(&collection_name);
            (format!("{database_name}.{collection_name}"), exists)
        }))
}

fn assert_collection_exists(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    match collection_exists(context, arguments)? {
        Ok((_, true)) => Ok(OperationOutcome::Success(Value::Null)),
        Ok((namespace, false)) => Err(mismatch(
            "assertCollectionExists",
            format!("collection {namespace} does not exist"),
        )),
        Err(error) => Ok(OperationOutcome::Failure(error)),
    }
}

fn assert_collection_not_exists(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    match collection_exists(context, arguments)? {
        Ok((_, false)) => Ok(OperationOutcome::Success(Value::Null)),
        Ok((namespace, true)) => Err(mismatch(
            "assertCollectionNotExists",
            format!("collection {namespace} exists"),
        )),
        Err(error) => Ok(OperationOutcome::Failure(error)),
    }
}

/// Session ids of the last two commands the client started.
fn last_two_lsids(
    context: &TestRunnerContext<'_>,
    arguments: &mut Arguments,
    operation: &str,
) -> Result<(Document, Document), CaseFailure> {
    let client_id = arguments.string("client")?;
    arguments.finish()?;
    let client = context.registry.client(&client_id)?;
    if !client.observed {
        return Err(arguments
            .invalid(format!("client '{client_id}' does not observe events"))
            .into());
    }
    let started = context
        .registry
        .recorder()
        .command_started_since(&client_id, EventMark::ORIGIN);
    let lsid = |position: usize| {
        started
            .len()
            .checked_sub(position)
            .and_then(|index| started.get(index))
            .and_then(|event| event.command.get_document("lsid"))
            .cloned()
    };
    match (lsid(2), lsid(1)) {
        (Some(previous), Some(last)) => Ok((previous, last)),
        _ => Err(mismatch(
            operation,
            format!(
                "client '{client_id}' did not start two commands with session ids (saw {})",
                started.len()
            ),
        )),
    }
}

fn assert_same_lsid(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    const OPERATION: &str = "assertSameLsidOnLastTwoCommands";
    let (previous, last) = last_two_lsids(context, arguments, OPERATION)?;
    if previous == last {
        Ok(OperationOutcome::Success(Value::Null))
    } else {
        Err(mismatch(
            OPERATION,
            format!("session ids differ: {previous} then {last}"),
        ))
    }
}

fn assert_different_lsid(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    const OPERATION: &str = "assertDifferentLsidOnLastTwoCommands";
    let (previous, last) = last_two_lsids(context, arguments, OPERATION)?;
    if previous == last {
        Err(mismatch(
            OPERATION,
            format!("both commands used session {last}"),
        ))
    } else {
        Ok(OperationOutcome::Success(Value::Null))
    }
}

fn session_dirty(
    context: &TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> Result<(String, bool), CaseFailure> {
    let session_id = arguments.string("session")?;
    arguments.finish()?;
    let session = context.registry.session(&session_id)?;
    Ok((session_id, session.client.is_session_dirty(&session.lsid)))
}

fn assert_session_not_dirty(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    match session_dirty(context, arguments)? {
        (_, false) => Ok(OperationOutcome::Success(Value::Null)),
        (id, true) => Err(mismatch(
            "assertSessionNotDirty",
            format!("session '{id}' is dirty"),
        )),
    }
}

fn assert_session_dirty(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    match session_dirty(context, arguments)? {
        (_, true) => Ok(OperationOutcome::Success(Value::Null)),
        (id, false) => Err(mismatch(
            "assertSessionDirty",
            format!("session '{id}' is not dirty"),
        )),
    }
}

fn assert_number_connections_checked_out(
    context: &mut TestRunnerContext<'_>,
    arguments: &mut Arguments,
) -> HandlerResult {
    let client_id = arguments.string("client")?;
    let expected = arguments.i64("connections")?;
    arguments.finish()?;
    let actual = context
        .registry
        .client(&client_id)?
        .client
        .checked_out_connections();
    if usize::try_from(expected).is_ok_and(|count| count == actual) {
        Ok(OperationOutcome::Success(Value::Null))
    } else {
        Err(mismatch(
            "assertNumberConnectionsCheckedOut",
            format!("expected {expected} checked-out connections, found {actual}"),
        ))
    }
}
