//! Operation dispatch.
//!
//! An operation names an object (an entity id or `testRunner`) and an
//! operation name. The object's kind selects a static routing table; the name
//! selects the handler. Handlers consume their arguments, call the client
//! library and turn its reply into an [`OperationOutcome`].

mod arguments;
mod bucket;
mod client;
mod collection;
mod database;
mod test_runner;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use utr_client::{ClientError, CommandOptions, DatabaseClient};
use utr_model::{EntityKind, Operation, Value};

pub use test_runner::EnabledFailPoints;

use crate::entity::LiveEntity;
use crate::error::{CaseFailure, SpecificationError};
use crate::registry::EntityRegistry;
use arguments::Arguments;
use test_runner::TestRunnerContext;

const EXECUTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");

/// What an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// The operation returned a result.
    Success(Value),
    /// The client reported a failure.
    Failure(ClientError),
}

impl OperationOutcome {
    /// Wraps a client call result, converting its success value.
    pub(crate) fn from_result<T>(
        result: Result<T, ClientError>,
        convert: impl FnOnce(T) -> Value,
    ) -> Self {
        match result {
            Ok(value) => Self::Success(convert(value)),
            Err(error) => Self::Failure(error),
        }
    }

    /// Successful outcome without a result value.
    pub(crate) fn from_unit(result: Result<(), ClientError>) -> Self {
        Self::from_result(result, |()| Value::Null)
    }
}

type HandlerResult = Result<OperationOutcome, CaseFailure>;

/// Operation names supported by one kind of object.
pub(crate) struct RoutingTable<H: 'static> {
    pub(crate) object: &'static str,
    pub(crate) operations: &'static [(&'static str, H)],
}

impl<H: Copy> RoutingTable<H> {
    pub(crate) fn route(&self, name: &str) -> Result<H, SpecificationError> {
        self.operations
            .iter()
            .find(|(operation, _)| *operation == name)
            .map(|(_, handler)| *handler)
            .ok_or_else(|| SpecificationError::unsupported_operation(self.object, name))
    }

    /// Whether the table has an entry for `name`.
    pub(crate) fn supports(&self, name: &str) -> bool {
        self.operations.iter().any(|(operation, _)| *operation == name)
    }
}

/// State an operation runs against.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    /// Entities of the current scope.
    pub registry: &'a EntityRegistry,
    /// Unobserved client used by `testRunner` assertions.
    pub internal_client: &'a Arc<dyn DatabaseClient>,
    /// Deadline applied when neither the operation nor its client sets one.
    pub default_timeout: Option<Duration>,
    /// Fail points enabled during the current case.
    pub fail_points: &'a mut EnabledFailPoints,
}

/// Executes one operation.
///
/// The `session` argument is resolved to the session's `lsid` and attached to
/// the command; `timeoutMS` overrides the deadline.
///
/// # Errors
///
/// Returns [`CaseFailure::Specification`] when the object or operation is
/// unknown or the arguments are malformed, and [`CaseFailure::Assertion`]
/// when a `testRunner` assertion does not hold. Client failures are returned
/// as [`OperationOutcome::Failure`].
pub fn execute(
    operation: &Operation,
    context: &mut ExecutionContext<'_>,
) -> Result<OperationOutcome, CaseFailure> {
    debug!(
        target: EXECUTOR_TARGET,
        object = operation.object.as_str(),
        operation = operation.name.as_str(),
        "executing operation"
    );
    let mut arguments = Arguments::new(&operation.name, operation.arguments.clone());
    let name = operation.name.as_str();

    if operation.targets_test_runner() {
        let handler = test_runner::OPERATIONS.route(name)?;
        let mut runner = TestRunnerContext {
            registry: context.registry,
            internal_client: context.internal_client,
            fail_points: context.fail_points,
        };
        return handler(&mut runner, &mut arguments);
    }

    let entity = context.registry.resolve(&operation.object)?;
    let options = command_options(operation, &mut arguments, context)?;
    match entity {
        LiveEntity::Client(target) => {
            client::CLIENT_OPERATIONS.route(name)?(target, &mut arguments, &options)
        }
        LiveEntity::Database(target) => {
            database::OPERATIONS.route(name)?(&target.database, &mut arguments, &options)
        }
        LiveEntity::Collection(target) => {
            collection::OPERATIONS.route(name)?(&target.collection, &mut arguments, &options)
        }
        LiveEntity::Session(target) => {
            client::SESSION_OPERATIONS.route(name)?(target, &mut arguments, &options)
        }
        LiveEntity::Bucket(target) => {
            bucket::OPERATIONS.route(name)?(&target.bucket, &mut arguments, &options)
        }
        LiveEntity::Value(_) => {
            Err(SpecificationError::unsupported_operation(entity.kind().to_string(), name).into())
        }
    }
}

/// Whether the routing table of an object kind has an entry for `name`;
/// `None` selects the `testRunner` table.
#[must_use]
pub fn is_supported(object_kind: Option<EntityKind>, name: &str) -> bool {
    match object_kind {
        None => test_runner::OPERATIONS.supports(name),
        Some(EntityKind::Client) => client::CLIENT_OPERATIONS.supports(name),
        Some(EntityKind::Database) => database::OPERATIONS.supports(name),
        Some(EntityKind::Collection) => collection::OPERATIONS.supports(name),
        Some(EntityKind::Session) => client::SESSION_OPERATIONS.supports(name),
        Some(EntityKind::Bucket) => bucket::OPERATIONS.supports(name),
        Some(EntityKind::Value) => false,
    }
}

/// Builds the per-command options from the `session` and `timeoutMS`
/// arguments.
fn command_options(
    operation: &Operation,
    arguments: &mut Arguments,
    context: &ExecutionContext<'_>,
) -> Result<CommandOptions, CaseFailure> {
    let session = match arguments.take("session") {
        None => None,
        Some(Value::String(id)) => Some(context.registry.session(&id)?.lsid.clone()),
        Some(other) => {
            return Err(arguments
                .invalid(format!(
                    "'session' must be an entity id, got {}",
                    other.type_name()
                ))
                .into());
        }
    };
    let timeout = match arguments.optional_i64("timeoutMS")? {
        Some(millis) => Some(
            u64::try_from(millis)
                .map_err(|_| arguments.invalid("'timeoutMS' must not be negative"))?,
        )
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis),
        None => context
            .registry
            .owning_client(&operation.object)
            .and_then(|client| client.timeout)
            .or(context.default_timeout),
    };
    Ok(CommandOptions::default()
        .with_session(session)
        .with_deadline(timeout.map(|duration| Instant::now() + duration)))
}
