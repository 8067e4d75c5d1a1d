//! Test file data model.
//!
//! Field names follow the camelCase keys of the JSON encoding. Everything that
//! holds test data (arguments, expectations, documents) is a [`Document`] or
//! [`Value`] so Extended JSON wrappers survive parsing.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entity::EntityDescriptor;
use crate::event::{EventCategory, EventKind};
use crate::value::{Document, Value};
use crate::version::Version;

/// Reserved operation target that addresses the interpreter itself.
pub const TEST_RUNNER_OBJECT: &str = "testRunner";

/// A complete test file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFile {
    /// Human-readable description.
    pub description: String,
    /// Schema version the file was written against.
    pub schema_version: Version,
    /// Requirements for running any case in the file.
    #[serde(default)]
    pub run_on_requirements: Vec<RunOnRequirement>,
    /// Entities created before the first case, in declaration order.
    #[serde(default)]
    pub create_entities: Vec<EntityDescriptor>,
    /// Collections seeded before the cases run.
    #[serde(default)]
    pub initial_data: Vec<CollectionData>,
    /// Test cases, run in order.
    pub tests: Vec<TestCase>,
    /// Entity lifetime across cases.
    #[serde(default)]
    pub isolation: Option<Isolation>,
}

impl TestFile {
    /// Parses a test file from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for malformed JSON, unknown entity
    /// kinds, unknown event names or invalid Extended JSON.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Lifetime of entities and seeded data across test cases.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Isolation {
    /// Entities are created once and shared by every case.
    #[default]
    File,
    /// Entities and initial data are rebuilt for each case.
    Test,
}

/// Server topology a requirement can name.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Topology {
    /// Standalone server.
    #[default]
    Single,
    /// Replica set.
    Replicaset,
    /// Sharded cluster.
    Sharded,
    /// Servers behind a load balancer.
    LoadBalanced,
    /// Sharded cluster whose shards are replica sets.
    ShardedReplicaset,
}

/// One alternative set of server requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOnRequirement {
    /// Oldest acceptable server version, inclusive.
    #[serde(default)]
    pub min_server_version: Option<Version>,
    /// Newest acceptable server version, inclusive.
    #[serde(default)]
    pub max_server_version: Option<Version>,
    /// Acceptable topologies; empty accepts any.
    #[serde(default)]
    pub topologies: Vec<Topology>,
}

impl RunOnRequirement {
    /// Whether a server with the given version and topology satisfies this
    /// requirement.
    #[must_use]
    pub fn is_met(&self, server_version: Version, topology: Topology) -> bool {
        let above_min = self
            .min_server_version
            .is_none_or(|min| server_version >= min);
        let below_max = self.max_server_version.is_none_or(|max| {
            // An unspecified patch accepts every patch release of the minor.
            if max.patch() == 0 {
                (server_version.major(), server_version.minor()) <= (max.major(), max.minor())
            } else {
                server_version <= max
            }
        });
        let topology_ok = self.topologies.is_empty()
            || self.topologies.contains(&topology)
            || (topology == Topology::ShardedReplicaset
                && self.topologies.contains(&Topology::Sharded));
        above_min && below_max && topology_ok
    }

    /// Whether any alternative in the list is met. An empty list is met.
    #[must_use]
    pub fn any_met(requirements: &[Self], server_version: Version, topology: Topology) -> bool {
        requirements.is_empty()
            || requirements
                .iter()
                .any(|requirement| requirement.is_met(server_version, topology))
    }
}

/// Contents of one collection, used for seeding and for outcome checks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionData {
    /// Collection name.
    pub collection_name: String,
    /// Database name.
    pub database_name: String,
    /// Documents, in `_id` order for outcomes.
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// A single test case.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestCase {
    /// Human-readable description, unique within the file.
    pub description: String,
    /// Requirements for running this case.
    #[serde(default)]
    pub run_on_requirements: Vec<RunOnRequirement>,
    /// When present, the case is skipped with this reason.
    #[serde(default)]
    pub skip_reason: Option<String>,
    /// Operations, run strictly in order.
    pub operations: Vec<Operation>,
    /// Events each observed client must have produced during the case.
    #[serde(default)]
    pub expect_events: Vec<ExpectedEventsForClient>,
    /// Expected collection contents after the case.
    #[serde(default)]
    pub outcome: Vec<CollectionData>,
}

/// An abstract operation replayed against an entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Operation {
    /// Operation name, for example `insertOne`.
    pub name: String,
    /// Target entity id or [`TEST_RUNNER_OBJECT`].
    pub object: String,
    /// Named arguments.
    #[serde(default)]
    pub arguments: Option<Document>,
    /// Required failure shape; the operation must fail when present.
    #[serde(default)]
    pub expect_error: Option<ExpectedError>,
    /// Expected result, matched with root-level permissiveness.
    #[serde(default)]
    pub expect_result: Option<Value>,
    /// Entity id under which a successful result is saved.
    #[serde(default)]
    pub save_result_as_entity: Option<String>,
    /// Ignore both the result and any error.
    #[serde(default)]
    pub ignore_result_and_error: bool,
}

impl Operation {
    /// Whether the operation targets the interpreter rather than an entity.
    #[must_use]
    pub fn targets_test_runner(&self) -> bool {
        self.object == TEST_RUNNER_OBJECT
    }

    /// Looks up a named argument.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.as_ref().and_then(|args| args.get(name))
    }
}

/// Expected shape of an operation failure. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExpectedError {
    /// Must be `true` when present; only asserts that an error occurred.
    #[serde(default)]
    pub is_error: Option<bool>,
    /// Whether the error was raised by the client rather than the server.
    #[serde(default)]
    pub is_client_error: Option<bool>,
    /// Whether the error was a timeout.
    #[serde(default)]
    pub is_timeout_error: Option<bool>,
    /// Case-insensitive substring of the error message.
    #[serde(default)]
    pub error_contains: Option<String>,
    /// Server error code.
    #[serde(default)]
    pub error_code: Option<i32>,
    /// Server error code name.
    #[serde(default)]
    pub error_code_name: Option<String>,
    /// Labels the error must carry.
    #[serde(default)]
    pub error_labels_contain: Vec<String>,
    /// Labels the error must not carry.
    #[serde(default)]
    pub error_labels_omit: Vec<String>,
    /// Expected partial result carried by the error.
    #[serde(default)]
    pub expect_result: Option<Value>,
}

/// Events expected from one client during a case.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExpectedEventsForClient {
    /// Client entity id.
    pub client: String,
    /// Event stream compared.
    #[serde(default)]
    pub event_type: EventCategory,
    /// Expected events, in order.
    pub events: Vec<ExpectedEvent>,
    /// Whether extra trailing events are tolerated.
    #[serde(default)]
    pub ignore_extra_events: bool,
}

/// One expected event, written as `{"<kind>": {<fields>}}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Document", into = "Document")]
pub struct ExpectedEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Expected event fields, matched against the observed event.
    pub fields: Document,
}

/// Error raised when an expected event is not a single-key kind mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected event must be a single-key mapping naming a known event kind, got {found}")]
pub struct ExpectedEventError {
    found: String,
}

impl TryFrom<Document> for ExpectedEvent {
    type Error = ExpectedEventError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let error = || ExpectedEventError {
            found: document.to_string(),
        };
        if document.len() != 1 {
            return Err(error());
        }
        let Some((name, body)) = document.first() else {
            return Err(error());
        };
        let kind = name.parse::<EventKind>().map_err(|_| error())?;
        let fields = match body {
            Value::Document(fields) => fields.clone(),
            Value::Null => Document::new(),
            _ => return Err(error()),
        };
        Ok(Self { kind, fields })
    }
}

impl From<ExpectedEvent> for Document {
    fn from(event: ExpectedEvent) -> Self {
        let mut document = Self::new();
        document.insert(event.kind.as_str(), event.fields);
        document
    }
}
