//! Database operations.

use utr_client::CommandOptions;
use utr_client::driver::Database;
use utr_model::Value;

use super::arguments::Arguments;
use super::client::string_array;
use super::{HandlerResult, OperationOutcome, RoutingTable};

type DatabaseHandler = fn(&Database, &mut Arguments, &CommandOptions) -> HandlerResult;

pub(crate) const OPERATIONS: RoutingTable<DatabaseHandler> = RoutingTable {
    object: "database",
    operations: &[
        ("runCommand", run_command),
        ("createCollection", create_collection),
        ("dropCollection", drop_collection),
        ("listCollectionNames", list_collection_names),
    ],
};

fn run_command(
    database: &Database,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let command = arguments.document("command")?;
    // `commandName` only documents the command for drivers that need it.
    arguments.take("commandName");
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        database.run_command(command, options),
        Value::Document,
    ))
}

fn create_collection(
    database: &Database,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let name = arguments.string("collection")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_unit(
        database.create_collection(&name, options),
    ))
}

fn drop_collection(
    database: &Database,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let name = arguments.string("collection")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_unit(
        database.drop_collection(&name, options),
    ))
}

fn list_collection_names(
    database: &Database,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        database.list_collection_names(options),
        string_array,
    ))
}
