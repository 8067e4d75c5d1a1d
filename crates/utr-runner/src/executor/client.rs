//! Client and session operations.

use utr_client::driver::list_database_names;
use utr_client::{ClientError, CommandOptions};
use utr_model::Value;

use super::arguments::Arguments;
use super::{HandlerResult, OperationOutcome, RoutingTable};
use crate::entity::{ClientEntity, SessionEntity};

type ClientHandler = fn(&ClientEntity, &mut Arguments, &CommandOptions) -> HandlerResult;
type SessionHandler = fn(&SessionEntity, &mut Arguments, &CommandOptions) -> HandlerResult;

pub(crate) const CLIENT_OPERATIONS: RoutingTable<ClientHandler> = RoutingTable {
    object: "client",
    operations: &[("listDatabaseNames", list_databases)],
};

pub(crate) const SESSION_OPERATIONS: RoutingTable<SessionHandler> = RoutingTable {
    object: "session",
    operations: &[("endSession", end_session)],
};

fn list_databases(
    target: &ClientEntity,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        list_database_names(target.client.as_ref(), options),
        string_array,
    ))
}

fn end_session(
    session: &SessionEntity,
    arguments: &mut Arguments,
    _options: &CommandOptions,
) -> HandlerResult {
    arguments.finish()?;
    if !session.mark_ended() {
        return Ok(OperationOutcome::Failure(ClientError::client(
            "session has already ended",
        )));
    }
    Ok(OperationOutcome::from_unit(
        session.client.end_session(&session.lsid),
    ))
}

pub(super) fn string_array(names: Vec<String>) -> Value {
    Value::Array(names.into_iter().map(Value::String).collect())
}
