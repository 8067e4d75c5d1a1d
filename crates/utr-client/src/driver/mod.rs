//! Collection-level operations built on [`DatabaseClient::run_command`].
//!
//! Each operation assembles the command a driver would send, runs it through
//! the client and turns the reply into a typed result. Write errors inside an
//! `ok: 1` reply become [`ClientError::Server`] carrying the partial result.

mod bucket;
mod collection;
mod database;
mod results;

use utr_model::{Document, Value};

pub use bucket::Bucket;
pub use collection::{Collection, FindOptions};
pub use database::Database;
pub use results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};

use crate::client::{CommandOptions, DatabaseClient};
use crate::error::ClientError;

/// Names of every database on the server.
///
/// # Errors
///
/// Returns the failure of the `listDatabases` command.
pub fn list_database_names(
    client: &dyn DatabaseClient,
    options: &CommandOptions,
) -> Result<Vec<String>, ClientError> {
    let mut command = Document::new();
    command.insert("listDatabases", 1);
    command.insert("nameOnly", true);
    let reply = client.run_command("admin", command, options)?;
    Ok(reply
        .get_array("databases")
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .filter_map(|database| database.get_str("name"))
        .map(str::to_owned)
        .collect())
}

/// Reads every document from a cursor reply, issuing `getMore` until the
/// cursor is exhausted.
fn drain_cursor(
    client: &dyn DatabaseClient,
    database: &str,
    reply: &Document,
    options: &CommandOptions,
) -> Result<Vec<Document>, ClientError> {
    let cursor = reply
        .get_document("cursor")
        .ok_or_else(|| ClientError::client("reply does not contain a cursor"))?;
    let mut documents = batch(cursor, "firstBatch");
    let mut id = cursor.get_i64("id").unwrap_or_default();
    let collection = cursor
        .get_str("ns")
        .and_then(|namespace| namespace.split_once('.'))
        .map_or("", |(_, collection)| collection)
        .to_owned();
    while id != 0 {
        let mut command = Document::new();
        command.insert("getMore", Value::Int64(id));
        command.insert("collection", collection.as_str());
        let next = client.run_command(database, command, options)?;
        let body = next
            .get_document("cursor")
            .ok_or_else(|| ClientError::client("getMore reply does not contain a cursor"))?;
        documents.extend(batch(body, "nextBatch"));
        id = body.get_i64("id").unwrap_or_default();
    }
    Ok(documents)
}

fn batch(cursor: &Document, key: &str) -> Vec<Document> {
    cursor
        .get_array(key)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .cloned()
        .collect()
}

/// Converts a count field of a reply to a long.
fn reply_count(reply: &Document, key: &str) -> i64 {
    reply.get_i64(key).unwrap_or_default()
}
