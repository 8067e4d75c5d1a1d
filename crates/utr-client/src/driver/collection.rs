//! Collection handle and its CRUD operations.

use utr_model::{Document, Value};

use crate::client::CommandOptions;
use crate::driver::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
use crate::driver::{Database, reply_count};
use crate::error::ClientError;
use crate::ids::new_object_id;

/// Options of a `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Query filter; empty matches everything.
    pub filter: Document,
    /// Sort specification.
    pub sort: Option<Document>,
    /// Documents to skip.
    pub skip: Option<i64>,
    /// Maximum number of documents; zero means no limit.
    pub limit: Option<i64>,
    /// Projection specification.
    pub projection: Option<Document>,
    /// Documents per batch.
    pub batch_size: Option<i64>,
}

/// A collection reached through a [`Database`].
#[derive(Debug, Clone)]
pub struct Collection {
    database: Database,
    name: String,
}

impl Collection {
    /// Handle for the collection `name` of `database`.
    #[must_use]
    pub fn new(database: Database, name: impl Into<String>) -> Self {
        Self {
            database,
            name: name.into(),
        }
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database the collection belongs to.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// `database.collection`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database.name(), self.name)
    }

    fn command(&self, name: &str) -> Document {
        let mut command = Document::new();
        command.insert(name, self.name.as_str());
        command
    }

    /// Inserts one document, generating an `_id` when it has none.
    ///
    /// # Errors
    ///
    /// Returns the command failure or the write error of the insert.
    pub fn insert_one(
        &self,
        document: Document,
        options: &CommandOptions,
    ) -> Result<InsertOneResult, ClientError> {
        let result = self.insert_many(vec![document], true, options)?;
        let inserted_id = result
            .inserted_ids
            .into_iter()
            .next()
            .map_or(Value::Null, |(_, id)| id);
        Ok(InsertOneResult { inserted_id })
    }

    /// Inserts documents, generating missing `_id`s.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] for an empty batch, or the first write
    /// error with the ids inserted before it as the partial result.
    pub fn insert_many(
        &self,
        documents: Vec<Document>,
        ordered: bool,
        options: &CommandOptions,
    ) -> Result<InsertManyResult, ClientError> {
        if documents.is_empty() {
            return Err(ClientError::client("insertMany requires at least one document"));
        }
        let mut ids = Vec::with_capacity(documents.len());
        let mut prepared = Vec::with_capacity(documents.len());
        for (index, mut document) in documents.into_iter().enumerate() {
            if !document.contains_key("_id") {
                document.insert_first("_id", new_object_id());
            }
            ids.push((index, document.get("_id").cloned().unwrap_or(Value::Null)));
            prepared.push(Value::Document(document));
        }
        let mut command = self.command("insert");
        command.insert("documents", prepared);
        command.insert("ordered", ordered);
        let reply = self.database.run_command(command, options)?;

        let failed = failed_indexes(&reply);
        let last_attempted = if ordered {
            failed.first().copied()
        } else {
            None
        };
        let inserted_ids = ids
            .into_iter()
            .filter(|(index, _)| !failed.contains(index))
            .filter(|(index, _)| last_attempted.is_none_or(|stop| *index < stop))
            .collect();
        checked(&reply, InsertManyResult { inserted_ids }, InsertManyResult::to_document)
    }

    /// Runs a `find` and reads every matching document.
    ///
    /// # Errors
    ///
    /// Returns the failure of `find` or of a following `getMore`.
    pub fn find(
        &self,
        find: &FindOptions,
        options: &CommandOptions,
    ) -> Result<Vec<Document>, ClientError> {
        let mut command = self.command("find");
        command.insert("filter", find.filter.clone());
        if let Some(sort) = &find.sort {
            command.insert("sort", sort.clone());
        }
        if let Some(skip) = find.skip {
            command.insert("skip", skip);
        }
        if let Some(limit) = find.limit {
            command.insert("limit", limit);
        }
        if let Some(projection) = &find.projection {
            command.insert("projection", projection.clone());
        }
        if let Some(batch_size) = find.batch_size {
            command.insert("batchSize", batch_size);
        }
        self.database.run_cursor_command(command, options)
    }

    /// Runs an aggregation pipeline and reads every output document.
    ///
    /// # Errors
    ///
    /// Returns the failure of `aggregate` or of a following `getMore`.
    pub fn aggregate(
        &self,
        pipeline: Vec<Value>,
        options: &CommandOptions,
    ) -> Result<Vec<Document>, ClientError> {
        let mut command = self.command("aggregate");
        command.insert("pipeline", pipeline);
        command.insert("cursor", Document::new());
        self.database.run_cursor_command(command, options)
    }

    /// Counts matching documents with an aggregation.
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying `aggregate`.
    pub fn count_documents(
        &self,
        filter: Document,
        skip: Option<i64>,
        limit: Option<i64>,
        options: &CommandOptions,
    ) -> Result<i64, ClientError> {
        let mut pipeline = vec![stage("$match", filter)];
        if let Some(count) = skip {
            pipeline.push(stage("$skip", count));
        }
        if let Some(count) = limit {
            pipeline.push(stage("$limit", count));
        }
        let mut group = Document::new();
        group.insert("_id", 1);
        group.insert("n", stage("$sum", 1));
        pipeline.push(stage("$group", group));
        let output = self.aggregate(pipeline, options)?;
        Ok(output
            .first()
            .map_or(0, |document| reply_count(document, "n")))
    }

    /// Counts every document using collection metadata.
    ///
    /// # Errors
    ///
    /// Returns the failure of the `count` command.
    pub fn estimated_document_count(&self, options: &CommandOptions) -> Result<i64, ClientError> {
        let reply = self
            .database
            .run_command(self.command("count"), options)?;
        Ok(reply_count(&reply, "n"))
    }

    /// Distinct values of a field among matching documents.
    ///
    /// # Errors
    ///
    /// Returns the failure of the `distinct` command.
    pub fn distinct(
        &self,
        field_name: &str,
        filter: Document,
        options: &CommandOptions,
    ) -> Result<Vec<Value>, ClientError> {
        let mut command = self.command("distinct");
        command.insert("key", field_name);
        command.insert("query", filter);
        let reply = self.database.run_command(command, options)?;
        Ok(reply.get_array("values").unwrap_or_default().to_vec())
    }

    /// Applies update operators to the first matching document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when `update` is not made of update
    /// operators, or the server failure.
    pub fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
        options: &CommandOptions,
    ) -> Result<UpdateResult, ClientError> {
        require_operators(&update)?;
        self.update(filter, update, upsert, false, options)
    }

    /// Applies update operators to every matching document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when `update` is not made of update
    /// operators, or the server failure.
    pub fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
        options: &CommandOptions,
    ) -> Result<UpdateResult, ClientError> {
        require_operators(&update)?;
        self.update(filter, update, upsert, true, options)
    }

    /// Replaces the first matching document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when `replacement` contains update
    /// operators, or the server failure.
    pub fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
        options: &CommandOptions,
    ) -> Result<UpdateResult, ClientError> {
        if replacement.keys().any(|key| key.starts_with('$')) {
            return Err(ClientError::client(
                "replacement document must not contain update operators",
            ));
        }
        self.update(filter, replacement, upsert, false, options)
    }

    fn update(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
        multi: bool,
        options: &CommandOptions,
    ) -> Result<UpdateResult, ClientError> {
        let mut statement = Document::new();
        statement.insert("q", filter);
        statement.insert("u", update);
        statement.insert("upsert", upsert);
        statement.insert("multi", multi);
        let mut command = self.command("update");
        command.insert("updates", vec![Value::Document(statement)]);
        let reply = self.database.run_command(command, options)?;

        let upserted_id = reply
            .get_array("upserted")
            .and_then(<[Value]>::first)
            .and_then(Value::as_document)
            .and_then(|entry| entry.get("_id"))
            .cloned();
        let upserted_count = i64::from(upserted_id.is_some());
        let result = UpdateResult {
            matched_count: reply_count(&reply, "n") - upserted_count,
            modified_count: reply_count(&reply, "nModified"),
            upserted_count,
            upserted_id,
        };
        checked(&reply, result, UpdateResult::to_document)
    }

    /// Deletes the first matching document.
    ///
    /// # Errors
    ///
    /// Returns the failure of the `delete` command.
    pub fn delete_one(
        &self,
        filter: Document,
        options: &CommandOptions,
    ) -> Result<DeleteResult, ClientError> {
        self.delete(filter, 1, options)
    }

    /// Deletes every matching document.
    ///
    /// # Errors
    ///
    /// Returns the failure of the `delete` command.
    pub fn delete_many(
        &self,
        filter: Document,
        options: &CommandOptions,
    ) -> Result<DeleteResult, ClientError> {
        self.delete(filter, 0, options)
    }

    fn delete(
        &self,
        filter: Document,
        limit: i32,
        options: &CommandOptions,
    ) -> Result<DeleteResult, ClientError> {
        let mut statement = Document::new();
        statement.insert("q", filter);
        statement.insert("limit", limit);
        let mut command = self.command("delete");
        command.insert("deletes", vec![Value::Document(statement)]);
        let reply = self.database.run_command(command, options)?;
        let result = DeleteResult {
            deleted_count: reply_count(&reply, "n"),
        };
        checked(&reply, result, DeleteResult::to_document)
    }

    /// Drops the collection. A missing collection is not an error.
    ///
    /// # Errors
    ///
    /// Returns any failure other than `NamespaceNotFound`.
    pub fn drop(&self, options: &CommandOptions) -> Result<(), ClientError> {
        self.database.drop_collection(&self.name, options)
    }
}

fn stage(name: &str, operand: impl Into<Value>) -> Value {
    let mut document = Document::new();
    document.insert(name, operand);
    Value::Document(document)
}

fn require_operators(update: &Document) -> Result<(), ClientError> {
    if update.is_empty() || !update.keys().all(|key| key.starts_with('$')) {
        return Err(ClientError::client(
            "update document must contain only update operators",
        ));
    }
    Ok(())
}

fn write_errors(reply: &Document) -> impl Iterator<Item = &Document> {
    reply
        .get_array("writeErrors")
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
}

fn failed_indexes(reply: &Document) -> Vec<usize> {
    write_errors(reply)
        .filter_map(|entry| entry.get_i64("index"))
        .filter_map(|index| usize::try_from(index).ok())
        .collect()
}

/// Returns the result, or the first write error carrying it as the partial
/// result.
fn checked<T>(
    reply: &Document,
    result: T,
    render: impl FnOnce(&T) -> Document,
) -> Result<T, ClientError> {
    if let Some(entry) = write_errors(reply).next() {
        return Err(ClientError::from_reply(entry).with_partial_result(render(&result)));
    }
    Ok(result)
}
