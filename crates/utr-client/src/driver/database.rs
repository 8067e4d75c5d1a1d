//! Database handle.

use std::sync::Arc;

use utr_model::{BucketOptions, Document, Value};

use crate::client::{CommandOptions, DatabaseClient};
use crate::codes::NAMESPACE_NOT_FOUND;
use crate::driver::{Bucket, Collection, drain_cursor};
use crate::error::ClientError;

/// A named database reached through a client.
#[derive(Debug, Clone)]
pub struct Database {
    client: Arc<dyn DatabaseClient>,
    name: String,
}

impl Database {
    /// Handle for the database `name`.
    #[must_use]
    pub fn new(client: Arc<dyn DatabaseClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client the database is reached through.
    #[must_use]
    pub const fn client(&self) -> &Arc<dyn DatabaseClient> {
        &self.client
    }

    /// Handle for a collection of this database.
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(self.clone(), name)
    }

    /// File bucket stored in this database.
    #[must_use]
    pub fn bucket(&self, options: &BucketOptions) -> Bucket {
        Bucket::new(self.clone(), options)
    }

    /// Runs an arbitrary command and returns the reply.
    ///
    /// # Errors
    ///
    /// Returns the failure reported by the client.
    pub fn run_command(
        &self,
        command: Document,
        options: &CommandOptions,
    ) -> Result<Document, ClientError> {
        self.client.run_command(&self.name, command, options)
    }

    /// Creates a collection explicitly.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceExists` when the collection is already present.
    pub fn create_collection(&self, name: &str, options: &CommandOptions) -> Result<(), ClientError> {
        let mut command = Document::new();
        command.insert("create", name);
        self.run_command(command, options).map(drop)
    }

    /// Drops a collection. A missing collection is not an error.
    ///
    /// # Errors
    ///
    /// Returns any failure other than `NamespaceNotFound`.
    pub fn drop_collection(&self, name: &str, options: &CommandOptions) -> Result<(), ClientError> {
        let mut command = Document::new();
        command.insert("drop", name);
        match self.run_command(command, options) {
            Err(error) if error.code() == Some(NAMESPACE_NOT_FOUND) => Ok(()),
            other => other.map(drop),
        }
    }

    /// Names of the collections in this database.
    ///
    /// # Errors
    ///
    /// Returns the failure of `listCollections` or of a following `getMore`.
    pub fn list_collection_names(&self, options: &CommandOptions) -> Result<Vec<String>, ClientError> {
        let mut command = Document::new();
        command.insert("listCollections", 1);
        command.insert("nameOnly", true);
        let reply = self.run_command(command, options)?;
        let entries = drain_cursor(self.client.as_ref(), &self.name, &reply, options)?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .map(str::to_owned)
            .collect())
    }

    /// Runs a cursor-returning command and reads every result.
    pub(crate) fn run_cursor_command(
        &self,
        command: Document,
        options: &CommandOptions,
    ) -> Result<Vec<Document>, ClientError> {
        let reply = self.run_command(command, options)?;
        drain_cursor(self.client.as_ref(), &self.name, &reply, options)
    }
}
