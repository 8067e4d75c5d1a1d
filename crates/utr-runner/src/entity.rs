//! Runtime entities bound to test file identifiers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use utr_client::DatabaseClient;
use utr_client::driver::{Bucket, Collection, Database};
use utr_model::{Document, EntityKind, Value};

/// A client entity.
#[derive(Debug, Clone)]
pub struct ClientEntity {
    /// The connected client.
    pub client: Arc<dyn DatabaseClient>,
    /// Operation timeout from the client's `timeoutMS` URI option.
    pub timeout: Option<Duration>,
    /// Whether the client records events.
    pub observed: bool,
}

/// A database handle and the client it was created from.
#[derive(Debug, Clone)]
pub struct DatabaseEntity {
    /// Owning client id.
    pub client_id: String,
    /// The handle.
    pub database: Database,
}

/// A collection handle and the client it was created from.
#[derive(Debug, Clone)]
pub struct CollectionEntity {
    /// Owning client id.
    pub client_id: String,
    /// The handle.
    pub collection: Collection,
}

/// A logical session.
#[derive(Debug)]
pub struct SessionEntity {
    /// Owning client id.
    pub client_id: String,
    /// The client the session was started on.
    pub client: Arc<dyn DatabaseClient>,
    /// Session identifier document.
    pub lsid: Document,
    ended: AtomicBool,
}

impl SessionEntity {
    /// A session that has not ended yet.
    #[must_use]
    pub fn new(client_id: String, client: Arc<dyn DatabaseClient>, lsid: Document) -> Self {
        Self {
            client_id,
            client,
            lsid,
            ended: AtomicBool::new(false),
        }
    }

    /// Whether `endSession` already ran.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Records that the session ended; returns `false` if it already had.
    pub fn mark_ended(&self) -> bool {
        !self.ended.swap(true, Ordering::AcqRel)
    }
}

/// A file bucket and the client it was created from.
#[derive(Debug, Clone)]
pub struct BucketEntity {
    /// Owning client id.
    pub client_id: String,
    /// The bucket.
    pub bucket: Bucket,
}

/// An entity owned by the registry.
///
/// Entity kinds are a closed set; every consumer switches over them
/// exhaustively.
#[derive(Debug)]
pub enum LiveEntity {
    /// See [`ClientEntity`].
    Client(ClientEntity),
    /// See [`DatabaseEntity`].
    Database(DatabaseEntity),
    /// See [`CollectionEntity`].
    Collection(CollectionEntity),
    /// See [`SessionEntity`].
    Session(SessionEntity),
    /// See [`BucketEntity`].
    Bucket(BucketEntity),
    /// A result saved with `saveResultAsEntity`.
    Value(Value),
}

impl LiveEntity {
    /// Kind of the entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Client(_) => EntityKind::Client,
            Self::Database(_) => EntityKind::Database,
            Self::Collection(_) => EntityKind::Collection,
            Self::Session(_) => EntityKind::Session,
            Self::Bucket(_) => EntityKind::Bucket,
            Self::Value(_) => EntityKind::Value,
        }
    }

    /// Identifier of the client the entity depends on; `None` for clients
    /// and saved values.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Database(entity) => Some(&entity.client_id),
            Self::Collection(entity) => Some(&entity.client_id),
            Self::Session(entity) => Some(&entity.client_id),
            Self::Bucket(entity) => Some(&entity.client_id),
            Self::Client(_) | Self::Value(_) => None,
        }
    }
}
