//! Command execution against in-memory databases.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;
use utr_model::{Document, Topology, Value, Version};

use crate::client::ServerInfo;
use crate::codes::{
    API_STRICT_ERROR, API_VERSION_ERROR, BAD_VALUE, COMMAND_NOT_FOUND, CURSOR_NOT_FOUND,
    DUPLICATE_KEY, FAILED_TO_PARSE, NAMESPACE_EXISTS, NAMESPACE_NOT_FOUND, UNAUTHORIZED,
};
use crate::ids::new_object_id;
use crate::memory::aggregate::run_pipeline;
use crate::memory::fail_point::FailPoints;
use crate::memory::failure::{CommandFailure, CommandResult, missing_field, wrong_type};
use crate::memory::lock;
use crate::memory::query::{matches_filter, project, sort_documents, values_equal};
use crate::memory::update::{apply_update, is_operator_update, upsert_seed};

const LOG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::memory");
const ADMIN_DATABASE: &str = "admin";
const MAX_WIRE_VERSION: i32 = 21;

/// Commands accepted when a client declares `apiStrict: true`.
const STRICT_API_COMMANDS: &[&str] = &[
    "abortTransaction",
    "aggregate",
    "authenticate",
    "collMod",
    "commitTransaction",
    "count",
    "create",
    "createIndexes",
    "delete",
    "drop",
    "dropDatabase",
    "dropIndexes",
    "endSessions",
    "explain",
    "find",
    "findAndModify",
    "getMore",
    "hello",
    "insert",
    "killCursors",
    "listCollections",
    "listDatabases",
    "listIndexes",
    "ping",
    "refreshSessions",
    "update",
];

/// How the server answers a command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Response {
    /// A reply document, successful or not.
    Reply(Document),
    /// The connection is dropped without a reply.
    CloseConnection,
}

/// A response and the time the server holds the connection before sending
/// it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Execution {
    pub(crate) delay: Option<Duration>,
    pub(crate) response: Response,
}

type Collections = BTreeMap<String, Vec<Document>>;

struct Cursor {
    namespace: String,
    remaining: VecDeque<Document>,
}

#[derive(Default)]
struct ServerState {
    databases: BTreeMap<String, Collections>,
    fail_points: FailPoints,
    cursors: HashMap<i64, Cursor>,
    next_cursor_id: i64,
}

/// In-memory database server shared by every client connected to it.
///
/// Implements the commands the driver layer issues, `failCommand` fail
/// points and the versioned API checks. Documents live in memory for the
/// lifetime of the server.
pub struct MemoryServer {
    info: ServerInfo,
    state: Mutex<ServerState>,
}

impl MemoryServer {
    /// Server reporting the given version and topology.
    #[must_use]
    pub fn new(version: Version, topology: Topology) -> Self {
        Self {
            info: ServerInfo { version, topology },
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Version and topology the server reports.
    #[must_use]
    pub const fn info(&self) -> ServerInfo {
        self.info
    }

    /// Snapshot of a collection's documents in insertion order.
    #[must_use]
    pub fn documents(&self, database: &str, collection: &str) -> Option<Vec<Document>> {
        let state = lock(&self.state);
        state
            .databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .cloned()
    }

    pub(crate) fn execute(
        &self,
        database: &str,
        command: &Document,
        app_name: Option<&str>,
    ) -> Execution {
        let name = command.first().map_or("", |(name, _)| name);
        let mut state = lock(&self.state);
        if name != "configureFailPoint"
            && let Some(action) = state.fail_points.trigger(name, app_name)
        {
            debug!(target: LOG_TARGET, command = name, "fail point triggered");
            let response = if action.close_connection {
                Response::CloseConnection
            } else if let Some(failure) = action.error {
                Response::Reply(failure.to_reply())
            } else {
                Response::Reply(self.dispatch(&mut state, database, name, command))
            };
            return Execution {
                delay: action.block,
                response,
            };
        }
        Execution {
            delay: None,
            response: Response::Reply(self.dispatch(&mut state, database, name, command)),
        }
    }

    fn dispatch(
        &self,
        state: &mut ServerState,
        database: &str,
        name: &str,
        command: &Document,
    ) -> Document {
        let result = check_api(name, command).and_then(|()| match name {
            "ping" | "endSessions" | "killAllSessions" | "refreshSessions" => Ok(Document::new()),
            "hello" | "isMaster" | "ismaster" => Ok(self.hello()),
            "buildInfo" | "buildinfo" => Ok(self.build_info()),
            "insert" => state.insert(database, command),
            "find" => state.find(database, command),
            "getMore" => state.get_more(command),
            "killCursors" => state.kill_cursors(command),
            "update" => state.update(database, command),
            "delete" => state.delete(database, command),
            "aggregate" => state.aggregate(database, command),
            "count" => state.count(database, command),
            "distinct" => state.distinct(database, command),
            "create" => state.create(database, command),
            "drop" => state.drop_collection(database, command),
            "listCollections" => state.list_collections(database, command),
            "listDatabases" => state.list_databases(database, command),
            "dropDatabase" => Ok(state.drop_database(database)),
            "configureFailPoint" => {
                require_admin(database, name)?;
                state.fail_points.configure(command).map(|()| Document::new())
            }
            other => Err(CommandFailure::new(
                COMMAND_NOT_FOUND,
                format!("no such command: '{other}'"),
            )),
        });
        match result {
            Ok(mut reply) => {
                reply.insert("ok", Value::Double(1.0));
                reply
            }
            Err(failure) => failure.to_reply(),
        }
    }

    fn hello(&self) -> Document {
        let mut reply = Document::new();
        reply.insert("isWritablePrimary", true);
        reply.insert("ismaster", true);
        reply.insert("minWireVersion", 0);
        reply.insert("maxWireVersion", MAX_WIRE_VERSION);
        match self.info.topology {
            Topology::Replicaset => {
                reply.insert("setName", "rs0");
            }
            Topology::Sharded | Topology::ShardedReplicaset => {
                reply.insert("msg", "isdbgrid");
            }
            Topology::Single | Topology::LoadBalanced => {}
        }
        reply
    }

    fn build_info(&self) -> Document {
        let version = self.info.version;
        let components = [version.major(), version.minor(), version.patch(), 0]
            .into_iter()
            .map(|part| i64::from(part).into())
            .collect::<Vec<Value>>();
        let mut reply = Document::new();
        reply.insert("version", version.to_string());
        reply.insert("versionArray", components);
        reply
    }
}

impl fmt::Debug for MemoryServer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MemoryServer")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new(Version::new(7, 0, 0), Topology::Single)
    }
}

fn check_api(name: &str, command: &Document) -> CommandResult<()> {
    let Some(version) = command.get("apiVersion") else {
        if command.contains_key("apiStrict") || command.contains_key("apiDeprecationErrors") {
            return Err(CommandFailure::new(
                BAD_VALUE,
                "apiStrict and apiDeprecationErrors require apiVersion",
            ));
        }
        return Ok(());
    };
    if version.as_str() != Some("1") {
        return Err(CommandFailure::new(
            API_VERSION_ERROR,
            format!("API version must be \"1\", found {version}"),
        ));
    }
    if command.get_bool("apiStrict") == Some(true)
        && name != "configureFailPoint"
        && !STRICT_API_COMMANDS.contains(&name)
    {
        return Err(CommandFailure::new(
            API_STRICT_ERROR,
            format!("Provided apiStrict:true, but the command {name} is not in API Version 1"),
        ));
    }
    Ok(())
}

fn require_admin(database: &str, name: &str) -> CommandResult<()> {
    if database == ADMIN_DATABASE {
        Ok(())
    } else {
        Err(CommandFailure::new(
            UNAUTHORIZED,
            format!("{name} may only be run against the admin database."),
        ))
    }
}

fn required_str<'c>(command: &'c Document, name: &str, field: &str) -> CommandResult<&'c str> {
    match command.get(field) {
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(wrong_type(name, field, "string")),
        None => Err(missing_field(name, field)),
    }
}

fn required_array<'c>(command: &'c Document, name: &str, field: &str) -> CommandResult<&'c [Value]> {
    match command.get(field) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(wrong_type(name, field, "array")),
        None => Err(missing_field(name, field)),
    }
}

fn optional_document<'c>(
    command: &'c Document,
    name: &str,
    field: &str,
) -> CommandResult<Option<&'c Document>> {
    match command.get(field) {
        Some(Value::Document(document)) => Ok(Some(document)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(wrong_type(name, field, "object")),
    }
}

fn optional_count(command: &Document, name: &str, field: &str) -> CommandResult<Option<usize>> {
    match command.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(|number| usize::try_from(number.unsigned_abs()).unwrap_or(usize::MAX))
            .map(Some)
            .ok_or_else(|| wrong_type(name, field, "long")),
    }
}

fn count_value(count: usize) -> Value {
    i32::try_from(count).map_or_else(
        |_| Value::Int64(i64::try_from(count).unwrap_or(i64::MAX)),
        Value::Int32,
    )
}

fn documents_value(documents: Vec<Document>) -> Value {
    Value::Array(documents.into_iter().map(Value::Document).collect())
}

impl ServerState {
    fn collection(&self, database: &str, collection: &str) -> Option<&Vec<Document>> {
        self.databases
            .get(database)
            .and_then(|collections| collections.get(collection))
    }

    fn collection_mut(&mut self, database: &str, collection: &str) -> &mut Vec<Document> {
        self.databases
            .entry(database.to_owned())
            .or_default()
            .entry(collection.to_owned())
            .or_default()
    }

    fn matching(
        &self,
        database: &str,
        collection: &str,
        filter: Option<&Document>,
    ) -> CommandResult<Vec<Document>> {
        let Some(stored) = self.collection(database, collection) else {
            return Ok(Vec::new());
        };
        let mut selected = Vec::new();
        for document in stored {
            if filter.map_or(Ok(true), |query| matches_filter(document, query))? {
                selected.push(document.clone());
            }
        }
        Ok(selected)
    }

    fn cursor_reply(
        &mut self,
        namespace: String,
        mut documents: Vec<Document>,
        batch_size: Option<usize>,
    ) -> Document {
        let mut id = 0_i64;
        if let Some(size) = batch_size.filter(|size| *size > 0 && *size < documents.len()) {
            let remaining: VecDeque<Document> = documents.split_off(size).into();
            self.next_cursor_id = self.next_cursor_id.saturating_add(1);
            id = self.next_cursor_id;
            self.cursors.insert(
                id,
                Cursor {
                    namespace: namespace.clone(),
                    remaining,
                },
            );
        }
        let mut cursor = Document::new();
        cursor.insert("firstBatch", documents_value(documents));
        cursor.insert("id", Value::Int64(id));
        cursor.insert("ns", namespace);
        let mut reply = Document::new();
        reply.insert("cursor", cursor);
        reply
    }

    fn insert(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "insert", "insert")?;
        let documents = required_array(command, "insert", "documents")?;
        let ordered = command.get_bool("ordered").unwrap_or(true);
        let stored = self.collection_mut(database, collection);
        let mut inserted = 0_usize;
        let mut write_errors = Vec::new();
        for (index, item) in documents.iter().enumerate() {
            let outcome = item
                .as_document()
                .ok_or_else(|| wrong_type("insert", "documents", "object"))
                .and_then(|document| {
                    insert_unique(stored, document.clone(), &format!("{database}.{collection}"))
                });
            match outcome {
                Ok(()) => inserted += 1,
                Err(failure) => {
                    write_errors.push(Value::Document(failure.to_write_error(index)));
                    if ordered {
                        break;
                    }
                }
            }
        }
        let mut reply = Document::new();
        reply.insert("n", count_value(inserted));
        if !write_errors.is_empty() {
            reply.insert("writeErrors", write_errors);
        }
        Ok(reply)
    }

    fn find(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "find", "find")?;
        let filter = optional_document(command, "find", "filter")?;
        let mut selected = self.matching(database, collection, filter)?;
        if let Some(sort) = optional_document(command, "find", "sort")? {
            sort_documents(&mut selected, sort)?;
        }
        let skip = optional_count(command, "find", "skip")?.unwrap_or(0);
        let limit = optional_count(command, "find", "limit")?
            .filter(|limit| *limit > 0)
            .unwrap_or(usize::MAX);
        let projection = optional_document(command, "find", "projection")?;
        let window = selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                projection.map_or_else(|| document.clone(), |spec| project(&document, spec))
            })
            .collect();
        let batch_size = optional_count(command, "find", "batchSize")?;
        Ok(self.cursor_reply(format!("{database}.{collection}"), window, batch_size))
    }

    fn get_more(&mut self, command: &Document) -> CommandResult<Document> {
        let id = command
            .get_i64("getMore")
            .ok_or_else(|| wrong_type("getMore", "getMore", "long"))?;
        let batch_size = optional_count(command, "getMore", "batchSize")?;
        let Some(cursor) = self.cursors.get_mut(&id) else {
            return Err(CommandFailure::new(
                CURSOR_NOT_FOUND,
                format!("cursor id {id} not found"),
            ));
        };
        let take = batch_size
            .filter(|size| *size > 0)
            .unwrap_or(cursor.remaining.len());
        let batch: Vec<Document> = cursor
            .remaining
            .drain(..take.min(cursor.remaining.len()))
            .collect();
        let namespace = cursor.namespace.clone();
        let exhausted = cursor.remaining.is_empty();
        if exhausted {
            self.cursors.remove(&id);
        }
        let mut body = Document::new();
        body.insert("nextBatch", documents_value(batch));
        body.insert("id", Value::Int64(if exhausted { 0 } else { id }));
        body.insert("ns", namespace);
        let mut reply = Document::new();
        reply.insert("cursor", body);
        Ok(reply)
    }

    fn kill_cursors(&mut self, command: &Document) -> CommandResult<Document> {
        let ids = required_array(command, "killCursors", "cursors")?;
        let (mut killed, mut missing) = (Vec::new(), Vec::new());
        for id in ids.iter().filter_map(Value::as_i64) {
            if self.cursors.remove(&id).is_some() {
                killed.push(Value::Int64(id));
            } else {
                missing.push(Value::Int64(id));
            }
        }
        let mut reply = Document::new();
        reply.insert("cursorsKilled", killed);
        reply.insert("cursorsNotFound", missing);
        reply.insert("cursorsAlive", Vec::<Value>::new());
        reply.insert("cursorsUnknown", Vec::<Value>::new());
        Ok(reply)
    }

    fn update(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "update", "update")?;
        let statements = required_array(command, "update", "updates")?;
        let ordered = command.get_bool("ordered").unwrap_or(true);
        let namespace = format!("{database}.{collection}");
        let stored = self.collection_mut(database, collection);
        let (mut matched, mut modified) = (0_usize, 0_usize);
        let mut upserted = Vec::new();
        let mut write_errors = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            match update_statement(stored, statement, &namespace) {
                Ok(outcome) => {
                    matched += outcome.matched;
                    modified += outcome.modified;
                    if let Some(id) = outcome.upserted_id {
                        let mut entry = Document::new();
                        entry.insert("index", count_value(index));
                        entry.insert("_id", id);
                        upserted.push(Value::Document(entry));
                    }
                }
                Err(failure) => {
                    write_errors.push(Value::Document(failure.to_write_error(index)));
                    if ordered {
                        break;
                    }
                }
            }
        }
        let mut reply = Document::new();
        reply.insert("n", count_value(matched + upserted.len()));
        reply.insert("nModified", count_value(modified));
        if !upserted.is_empty() {
            reply.insert("upserted", upserted);
        }
        if !write_errors.is_empty() {
            reply.insert("writeErrors", write_errors);
        }
        Ok(reply)
    }

    fn delete(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "delete", "delete")?;
        let statements = required_array(command, "delete", "deletes")?;
        let stored = self.collection_mut(database, collection);
        let mut deleted = 0_usize;
        for statement in statements {
            let spec = statement
                .as_document()
                .ok_or_else(|| wrong_type("delete", "deletes", "object"))?;
            let filter = spec
                .get_document("q")
                .ok_or_else(|| missing_field("delete.deletes", "q"))?;
            let single = spec.get_i64("limit") == Some(1);
            let mut index = 0;
            while index < stored.len() {
                let matched = stored
                    .get(index)
                    .map_or(Ok(false), |document| matches_filter(document, filter))?;
                if matched {
                    stored.remove(index);
                    deleted += 1;
                    if single {
                        break;
                    }
                } else {
                    index += 1;
                }
            }
        }
        let mut reply = Document::new();
        reply.insert("n", count_value(deleted));
        Ok(reply)
    }

    fn aggregate(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let pipeline = required_array(command, "aggregate", "pipeline")?;
        let (input, namespace) = match command.get("aggregate") {
            Some(Value::String(collection)) => (
                self.matching(database, collection, None)?,
                format!("{database}.{collection}"),
            ),
            Some(_) => (Vec::new(), format!("{database}.$cmd.aggregate")),
            None => return Err(missing_field("aggregate", "aggregate")),
        };
        let output = run_pipeline(input, pipeline)?;
        let batch_size = command
            .get_document("cursor")
            .map(|cursor| optional_count(cursor, "aggregate", "batchSize"))
            .transpose()?
            .flatten();
        Ok(self.cursor_reply(namespace, output, batch_size))
    }

    fn count(&self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "count", "count")?;
        let filter = optional_document(command, "count", "query")?;
        let skip = optional_count(command, "count", "skip")?.unwrap_or(0);
        let limit = optional_count(command, "count", "limit")?
            .filter(|limit| *limit > 0)
            .unwrap_or(usize::MAX);
        let total = self
            .matching(database, collection, filter)?
            .len()
            .saturating_sub(skip)
            .min(limit);
        let mut reply = Document::new();
        reply.insert("n", count_value(total));
        Ok(reply)
    }

    fn distinct(&self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "distinct", "distinct")?;
        let key = required_str(command, "distinct", "key")?;
        let filter = optional_document(command, "distinct", "query")?;
        let mut values: Vec<Value> = Vec::new();
        for document in self.matching(database, collection, filter)? {
            let found = match document.get_path(key) {
                Some(Value::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => Vec::new(),
            };
            for value in found {
                if !values.iter().any(|known| values_equal(known, &value)) {
                    values.push(value);
                }
            }
        }
        let mut reply = Document::new();
        reply.insert("values", values);
        Ok(reply)
    }

    fn create(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "create", "create")?;
        if self.collection(database, collection).is_some() {
            return Err(CommandFailure::new(
                NAMESPACE_EXISTS,
                format!("Collection {database}.{collection} already exists."),
            ));
        }
        self.collection_mut(database, collection);
        Ok(Document::new())
    }

    fn drop_collection(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let collection = required_str(command, "drop", "drop")?;
        let removed = self
            .databases
            .get_mut(database)
            .and_then(|collections| collections.remove(collection));
        if removed.is_none() {
            return Err(CommandFailure::new(NAMESPACE_NOT_FOUND, "ns not found"));
        }
        if self
            .databases
            .get(database)
            .is_some_and(BTreeMap::is_empty)
        {
            self.databases.remove(database);
        }
        let mut reply = Document::new();
        reply.insert("ns", format!("{database}.{collection}"));
        reply.insert("nIndexesWas", 1);
        Ok(reply)
    }

    fn list_collections(&mut self, database: &str, command: &Document) -> CommandResult<Document> {
        let filter = optional_document(command, "listCollections", "filter")?;
        let name_only = command.get_bool("nameOnly").unwrap_or(false);
        let names: Vec<String> = self
            .databases
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default();
        let mut entries = Vec::new();
        for name in names {
            let mut entry = Document::new();
            entry.insert("name", name);
            entry.insert("type", "collection");
            if !name_only {
                entry.insert("options", Document::new());
                let mut info = Document::new();
                info.insert("readOnly", false);
                entry.insert("info", info);
            }
            if filter.map_or(Ok(true), |query| matches_filter(&entry, query))? {
                entries.push(entry);
            }
        }
        Ok(self.cursor_reply(format!("{database}.$cmd.listCollections"), entries, None))
    }

    fn list_databases(&self, database: &str, command: &Document) -> CommandResult<Document> {
        require_admin(database, "listDatabases")?;
        let filter = optional_document(command, "listDatabases", "filter")?;
        let name_only = command.get_bool("nameOnly").unwrap_or(false);
        let mut entries = Vec::new();
        for (name, collections) in &self.databases {
            let mut entry = Document::new();
            entry.insert("name", name.as_str());
            if !name_only {
                entry.insert("sizeOnDisk", Value::Int64(0));
                entry.insert("empty", collections.values().all(Vec::is_empty));
            }
            if filter.map_or(Ok(true), |query| matches_filter(&entry, query))? {
                entries.push(Value::Document(entry));
            }
        }
        let mut reply = Document::new();
        reply.insert("databases", entries);
        if !name_only {
            reply.insert("totalSize", Value::Int64(0));
        }
        Ok(reply)
    }

    fn drop_database(&mut self, database: &str) -> Document {
        self.databases.remove(database);
        self.cursors
            .retain(|_, cursor| !cursor.namespace.starts_with(&format!("{database}.")));
        let mut reply = Document::new();
        reply.insert("dropped", database);
        reply
    }
}

struct UpdateOutcome {
    matched: usize,
    modified: usize,
    upserted_id: Option<Value>,
}

fn update_statement(
    stored: &mut Vec<Document>,
    statement: &Value,
    namespace: &str,
) -> CommandResult<UpdateOutcome> {
    let spec = statement
        .as_document()
        .ok_or_else(|| wrong_type("update", "updates", "object"))?;
    let filter = spec
        .get_document("q")
        .ok_or_else(|| missing_field("update.updates", "q"))?;
    let update = match spec.get("u") {
        Some(Value::Document(update)) => update,
        Some(Value::Array(_)) => {
            return Err(CommandFailure::new(
                BAD_VALUE,
                "pipeline-style updates are not supported",
            ));
        }
        Some(_) => return Err(wrong_type("update.updates", "u", "object")),
        None => return Err(missing_field("update.updates", "u")),
    };
    let multi = spec.get_bool("multi").unwrap_or(false);
    let upsert = spec.get_bool("upsert").unwrap_or(false);
    if multi && !is_operator_update(update) {
        return Err(CommandFailure::new(
            FAILED_TO_PARSE,
            "multi update is not supported for replacement-style update",
        ));
    }

    let (mut matched, mut modified) = (0_usize, 0_usize);
    for document in stored.iter_mut() {
        if !matches_filter(document, filter)? {
            continue;
        }
        matched += 1;
        let updated = apply_update(document, update, false)?;
        if updated != *document {
            *document = updated;
            modified += 1;
        }
        if !multi {
            break;
        }
    }
    if matched > 0 || !upsert {
        return Ok(UpdateOutcome {
            matched,
            modified,
            upserted_id: None,
        });
    }

    let created = upsert_seed(filter, update)?;
    let id = created.get("_id").cloned();
    insert_unique(stored, created, namespace)?;
    let upserted_id = id
        .or_else(|| stored.last().and_then(|document| document.get("_id")).cloned())
        .unwrap_or(Value::Null);
    Ok(UpdateOutcome {
        matched: 0,
        modified: 0,
        upserted_id: Some(upserted_id),
    })
}

fn insert_unique(
    stored: &mut Vec<Document>,
    mut document: Document,
    namespace: &str,
) -> CommandResult<()> {
    if !document.contains_key("_id") {
        document.insert_first("_id", new_object_id());
    }
    if let Some(id) = document.get("_id")
        && stored
            .iter()
            .any(|existing| existing.get("_id").is_some_and(|other| values_equal(other, id)))
    {
        return Err(CommandFailure::new(
            DUPLICATE_KEY,
            format!(
                "E11000 duplicate key error collection: {namespace} index: _id_ dup key: {{ _id: {id} }}"
            ),
        ));
    }
    stored.push(document);
    Ok(())
}
