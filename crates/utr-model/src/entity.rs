//! Declarative descriptions of the entities a test file creates.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::event::EventKind;
use crate::value::Document;

/// Kind of a runtime entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    /// Database client.
    Client,
    /// Database handle.
    Database,
    /// Collection handle.
    Collection,
    /// Logical session.
    Session,
    /// File storage bucket.
    Bucket,
    /// Value saved from an earlier operation result.
    Value,
}

/// One entry of `createEntities`.
///
/// Entries are externally tagged by kind, for example
/// `{"collection": {"id": "collection0", ...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityDescriptor {
    /// Creates a client.
    Client(ClientDescriptor),
    /// Creates a database handle from a client.
    Database(DatabaseDescriptor),
    /// Creates a collection handle from a database.
    Collection(CollectionDescriptor),
    /// Starts a session on a client.
    Session(SessionDescriptor),
    /// Creates a file bucket on a database.
    Bucket(BucketDescriptor),
}

impl EntityDescriptor {
    /// Identifier the entity is bound to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Client(client) => &client.id,
            Self::Database(database) => &database.id,
            Self::Collection(collection) => &collection.id,
            Self::Session(session) => &session.id,
            Self::Bucket(bucket) => &bucket.id,
        }
    }

    /// Kind of entity the descriptor creates.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Client(_) => EntityKind::Client,
            Self::Database(_) => EntityKind::Database,
            Self::Collection(_) => EntityKind::Collection,
            Self::Session(_) => EntityKind::Session,
            Self::Bucket(_) => EntityKind::Bucket,
        }
    }

    /// Parent entity the descriptor depends on, with the kind it must have.
    #[must_use]
    pub fn parent(&self) -> Option<(&str, EntityKind)> {
        match self {
            Self::Client(_) => None,
            Self::Database(database) => Some((database.client.as_str(), EntityKind::Client)),
            Self::Collection(collection) => {
                Some((collection.database.as_str(), EntityKind::Database))
            }
            Self::Session(session) => Some((session.client.as_str(), EntityKind::Client)),
            Self::Bucket(bucket) => Some((bucket.database.as_str(), EntityKind::Database)),
        }
    }
}

/// Description of a client entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientDescriptor {
    /// Entity identifier.
    pub id: String,
    /// Connection string options applied to the client.
    #[serde(default)]
    pub uri_options: Option<Document>,
    /// Event kinds recorded for later `expectEvents` checks.
    #[serde(default)]
    pub observe_events: Vec<EventKind>,
    /// Command names whose monitoring events are never recorded.
    #[serde(default)]
    pub ignore_command_monitoring_events: Vec<String>,
    /// Whether security-sensitive commands are recorded unredacted.
    #[serde(default)]
    pub observe_sensitive_commands: bool,
    /// Declared server API version sent with every command.
    #[serde(default)]
    pub server_api: Option<ServerApi>,
    /// Accepted for compatibility; the interpreter always uses one server.
    #[serde(default)]
    pub use_multiple_mongoses: Option<bool>,
}

/// Versioned API declaration for a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerApi {
    /// API version; only `"1"` exists.
    pub version: String,
    /// Whether the server rejects commands outside the API.
    #[serde(default)]
    pub strict: Option<bool>,
    /// Whether deprecated behaviour is reported as an error.
    #[serde(default)]
    pub deprecation_errors: Option<bool>,
}

impl ServerApi {
    /// The only declared API version.
    pub const V1: &'static str = "1";

    /// Whether the declared version is known.
    #[must_use]
    pub fn is_known_version(&self) -> bool {
        self.version == Self::V1
    }
}

/// Description of a database entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatabaseDescriptor {
    /// Entity identifier.
    pub id: String,
    /// Identifier of the owning client.
    pub client: String,
    /// Database name on the server.
    pub database_name: String,
}

/// Description of a collection entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionDescriptor {
    /// Entity identifier.
    pub id: String,
    /// Identifier of the owning database.
    pub database: String,
    /// Collection name on the server.
    pub collection_name: String,
}

/// Description of a session entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionDescriptor {
    /// Entity identifier.
    pub id: String,
    /// Identifier of the owning client.
    pub client: String,
    /// Session options, accepted but not interpreted.
    #[serde(default)]
    pub session_options: Option<Document>,
}

/// Description of a file bucket entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BucketDescriptor {
    /// Entity identifier.
    pub id: String,
    /// Identifier of the owning database.
    pub database: String,
    /// Bucket naming and chunking options.
    #[serde(default)]
    pub bucket_options: Option<BucketOptions>,
}

/// Options for a file bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    /// Prefix of the `.files` and `.chunks` collections.
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Chunk size in bytes.
    #[serde(default)]
    pub chunk_size_bytes: Option<u32>,
}

impl BucketOptions {
    /// Bucket name used when none is configured.
    pub const DEFAULT_BUCKET_NAME: &'static str = "fs";
    /// Chunk size used when none is configured (255 KiB).
    pub const DEFAULT_CHUNK_SIZE: u32 = 255 * 1024;

    /// Bucket name with the default applied.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        self.bucket_name
            .as_deref()
            .unwrap_or(Self::DEFAULT_BUCKET_NAME)
    }

    /// Chunk size with the default applied.
    #[must_use]
    pub fn chunk_size_bytes(&self) -> u32 {
        self.chunk_size_bytes.unwrap_or(Self::DEFAULT_CHUNK_SIZE)
    }
}
