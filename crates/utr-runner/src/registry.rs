//! Entity registry: creation, lookup and teardown of test entities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use utr_client::driver::Database;
use utr_client::{ClientError, ClientFactory, ClientOptions};
use utr_matcher::EntityLookup;
use utr_model::{
    BucketDescriptor, ClientDescriptor, CollectionDescriptor, DatabaseDescriptor, Document,
    EntityDescriptor, EntityKind, SessionDescriptor, Value,
};

use crate::entity::{
    BucketEntity, ClientEntity, CollectionEntity, DatabaseEntity, LiveEntity, SessionEntity,
};
use crate::error::RegistryError;
use crate::recorder::{EventFilter, EventRecorder};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A release step that failed during teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownFailure {
    /// Entity id.
    pub id: String,
    /// Failure reported by the client.
    pub error: ClientError,
}

/// Outcome of [`EntityRegistry::teardown`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    /// Entity ids released, in release order.
    pub released: Vec<String>,
    /// Release steps that failed; teardown continued past each.
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// Whether every entity was released cleanly.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the entities of one file run (or one case, under per-test
/// isolation).
///
/// Entities are created in declaration order and released in reverse.
#[derive(Debug)]
pub struct EntityRegistry {
    factory: Arc<dyn ClientFactory>,
    server_uri: String,
    recorder: Arc<EventRecorder>,
    entities: HashMap<String, LiveEntity>,
    order: Vec<String>,
}

impl EntityRegistry {
    /// Empty registry whose clients connect through `factory` to
    /// `server_uri` and report events to `recorder`.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        server_uri: impl Into<String>,
        recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            factory,
            server_uri: server_uri.into(),
            recorder,
            entities: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Recorder the registry's clients report to.
    #[must_use]
    pub const fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    /// Number of bound entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no entity is bound.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entity ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Creates the entity a descriptor describes and binds it to its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] when the id is bound,
    /// [`RegistryError::UnresolvedParent`] when the parent is missing or of
    /// the wrong kind, and [`RegistryError::Client`] when the client library
    /// fails.
    pub fn create(&mut self, descriptor: &EntityDescriptor) -> Result<(), RegistryError> {
        let id = descriptor.id();
        if self.entities.contains_key(id) {
            return Err(RegistryError::DuplicateId { id: id.to_owned() });
        }
        if let Some((parent, expected)) = descriptor.parent()
            && self.resolve(parent).map(LiveEntity::kind).ok() != Some(expected)
        {
            return Err(RegistryError::UnresolvedParent {
                id: id.to_owned(),
                parent: parent.to_owned(),
                expected,
            });
        }

        let entity = match descriptor {
            EntityDescriptor::Client(client) => self.create_client(client)?,
            EntityDescriptor::Database(database) => self.create_database(database)?,
            EntityDescriptor::Collection(collection) => self.create_collection(collection)?,
            EntityDescriptor::Session(session) => self.create_session(session)?,
            EntityDescriptor::Bucket(bucket) => self.create_bucket(bucket)?,
        };
        debug!(
            target: REGISTRY_TARGET,
            id,
            kind = %descriptor.kind(),
            "created entity"
        );
        self.bind(id, entity);
        Ok(())
    }

    fn bind(&mut self, id: &str, entity: LiveEntity) {
        self.order.push(id.to_owned());
        self.entities.insert(id.to_owned(), entity);
    }

    fn create_client(&self, descriptor: &ClientDescriptor) -> Result<LiveEntity, RegistryError> {
        let filter = EventFilter::from_descriptor(descriptor);
        let observed = filter.observes_anything();
        let uri_options = descriptor.uri_options.clone().unwrap_or_default();
        let timeout = uri_options
            .get_i64("timeoutMS")
            .and_then(|millis| u64::try_from(millis).ok())
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);
        let mut options = ClientOptions::new(self.server_uri.as_str());
        options.uri_options = uri_options;
        options.server_api.clone_from(&descriptor.server_api);
        options.observe_sensitive_commands = descriptor.observe_sensitive_commands;
        if observed {
            self.recorder.reset(&descriptor.id);
            options
                .listeners
                .push(self.recorder.listener(descriptor.id.as_str(), filter));
        }
        let client = self
            .factory
            .connect(&options)
            .map_err(|source| client_failure(&descriptor.id, source))?;
        Ok(LiveEntity::Client(ClientEntity {
            client,
            timeout,
            observed,
        }))
    }

    fn create_database(
        &self,
        descriptor: &DatabaseDescriptor,
    ) -> Result<LiveEntity, RegistryError> {
        let client = self.client(&descriptor.client)?;
        Ok(LiveEntity::Database(DatabaseEntity {
            client_id: descriptor.client.clone(),
            database: Database::new(Arc::clone(&client.client), descriptor.database_name.as_str()),
        }))
    }

    fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<LiveEntity, RegistryError> {
        let parent = self.database(&descriptor.database)?;
        Ok(LiveEntity::Collection(CollectionEntity {
            client_id: parent.client_id.clone(),
            collection: parent
                .database
                .collection(descriptor.collection_name.as_str()),
        }))
    }

    fn create_session(&self, descriptor: &SessionDescriptor) -> Result<LiveEntity, RegistryError> {
        let client = self.client(&descriptor.client)?;
        let lsid = client
            .client
            .start_session()
            .map_err(|source| client_failure(&descriptor.id, source))?;
        Ok(LiveEntity::Session(SessionEntity::new(
            descriptor.client.clone(),
            Arc::clone(&client.client),
            lsid,
        )))
    }

    fn create_bucket(&self, descriptor: &BucketDescriptor) -> Result<LiveEntity, RegistryError> {
        let parent = self.database(&descriptor.database)?;
        let options = descriptor.bucket_options.clone().unwrap_or_default();
        Ok(LiveEntity::Bucket(BucketEntity {
            client_id: parent.client_id.clone(),
            bucket: parent.database.bucket(&options),
        }))
    }

    /// Binds an operation result to a new id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] when the id is bound.
    pub fn save_value(&mut self, id: &str, value: Value) -> Result<(), RegistryError> {
        if self.entities.contains_key(id) {
            return Err(RegistryError::DuplicateId { id: id.to_owned() });
        }
        debug!(target: REGISTRY_TARGET, id, "saved result as entity");
        self.bind(id, LiveEntity::Value(value));
        Ok(())
    }

    /// Forgets every saved result; entities created from descriptors stay.
    pub fn discard_values(&mut self) {
        let entities = &mut self.entities;
        self.order.retain(|id| {
            let saved = matches!(entities.get(id), Some(LiveEntity::Value(_)));
            if saved {
                entities.remove(id);
            }
            !saved
        });
    }

    /// Looks an entity up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] when the id is not bound.
    pub fn resolve(&self, id: &str) -> Result<&LiveEntity, RegistryError> {
        self.entities
            .get(id)
            .ok_or_else(|| RegistryError::unknown(id))
    }

    fn typed<'r, T>(
        &'r self,
        id: &str,
        expected: EntityKind,
        project: impl FnOnce(&'r LiveEntity) -> Option<&'r T>,
    ) -> Result<&'r T, RegistryError> {
        let entity = self.resolve(id)?;
        project(entity).ok_or_else(|| RegistryError::wrong_kind(id, expected, entity.kind()))
    }

    /// Looks a client up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn client(&self, id: &str) -> Result<&ClientEntity, RegistryError> {
        self.typed(id, EntityKind::Client, |entity| match entity {
            LiveEntity::Client(client) => Some(client),
            _ => None,
        })
    }

    /// Looks a database up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn database(&self, id: &str) -> Result<&DatabaseEntity, RegistryError> {
        self.typed(id, EntityKind::Database, |entity| match entity {
            LiveEntity::Database(database) => Some(database),
            _ => None,
        })
    }

    /// Looks a collection up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn collection(&self, id: &str) -> Result<&CollectionEntity, RegistryError> {
        self.typed(id, EntityKind::Collection, |entity| match entity {
            LiveEntity::Collection(collection) => Some(collection),
            _ => None,
        })
    }

    /// Looks a session up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn session(&self, id: &str) -> Result<&SessionEntity, RegistryError> {
        self.typed(id, EntityKind::Session, |entity| match entity {
            LiveEntity::Session(session) => Some(session),
            _ => None,
        })
    }

    /// Looks a bucket up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn bucket(&self, id: &str) -> Result<&BucketEntity, RegistryError> {
        self.typed(id, EntityKind::Bucket, |entity| match entity {
            LiveEntity::Bucket(bucket) => Some(bucket),
            _ => None,
        })
    }

    /// Looks a saved value up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] or
    /// [`RegistryError::WrongKind`].
    pub fn value(&self, id: &str) -> Result<&Value, RegistryError> {
        self.typed(id, EntityKind::Value, |entity| match entity {
            LiveEntity::Value(value) => Some(value),
            _ => None,
        })
    }

    /// The client an entity belongs to; a client belongs to itself.
    #[must_use]
    pub fn owning_client(&self, id: &str) -> Option<&ClientEntity> {
        let entity = self.entities.get(id)?;
        let client_id = entity.client_id().unwrap_or(id);
        self.client(client_id).ok()
    }

    /// Releases every entity in reverse creation order.
    ///
    /// Sessions are ended and clients closed. A failing release is logged
    /// and recorded in the report; the remaining entities are still
    /// released.
    pub fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        while let Some(id) = self.order.pop() {
            let Some(entity) = self.entities.remove(&id) else {
                continue;
            };
            let released = match &entity {
                LiveEntity::Session(session) if session.mark_ended() => {
                    session.client.end_session(&session.lsid)
                }
                LiveEntity::Client(client) => client.client.close(),
                LiveEntity::Session(_)
                | LiveEntity::Database(_)
                | LiveEntity::Collection(_)
                | LiveEntity::Bucket(_)
                | LiveEntity::Value(_) => Ok(()),
            };
            if let Err(error) = released {
                warn!(
                    target: REGISTRY_TARGET,
                    id = id.as_str(),
                    kind = %entity.kind(),
                    error = %error,
                    "failed to release entity"
                );
                report.failures.push(TeardownFailure {
                    id: id.clone(),
                    error,
                });
            }
            report.released.push(id);
        }
        report
    }
}

fn client_failure(id: &str, source: ClientError) -> RegistryError {
    RegistryError::Client {
        id: id.to_owned(),
        source: Box::new(source),
    }
}

impl EntityLookup for EntityRegistry {
    fn entity_value(&self, id: &str) -> Option<Value> {
        match self.entities.get(id)? {
            LiveEntity::Value(value) => Some(value.clone()),
            LiveEntity::Session(session) => Some(Value::Document(session.lsid.clone())),
            LiveEntity::Client(_)
            | LiveEntity::Database(_)
            | LiveEntity::Collection(_)
            | LiveEntity::Bucket(_) => None,
        }
    }

    fn session_lsid(&self, id: &str) -> Option<Document> {
        self.session(id).ok().map(|session| session.lsid.clone())
    }
}
