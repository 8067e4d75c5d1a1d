//! Fixtures shared by the cases of one scope.
//!
//! Under file isolation one [`Scope`] lives for the whole file; under test
//! isolation every case gets its own.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use utr_client::driver::Database;
use utr_client::{ClientFactory, CommandOptions, DatabaseClient};
use utr_model::{CollectionData, EntityDescriptor};

use crate::error::SetupError;
use crate::recorder::EventRecorder;
use crate::registry::{EntityRegistry, TeardownReport};

const SCOPE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scope");

/// Entity creation failure, with the release of the entities created
/// before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OpenScopeError {
    /// Why the scope could not be opened.
    pub error: SetupError,
    /// Release of the entities created before the failure.
    pub teardown: TeardownReport,
}

/// Entities and event streams visible to a case.
#[derive(Debug)]
pub struct Scope {
    registry: EntityRegistry,
}

impl Scope {
    /// Creates the declared entities in order.
    ///
    /// On failure the entities created so far are torn down and the
    /// teardown is returned with the error.
    ///
    /// # Errors
    ///
    /// Returns an [`OpenScopeError`] carrying [`SetupError::Entity`] for the
    /// first entity that cannot be created.
    pub fn open(
        descriptors: &[EntityDescriptor],
        factory: Arc<dyn ClientFactory>,
        server_uri: &str,
    ) -> Result<Self, OpenScopeError> {
        let recorder = Arc::new(EventRecorder::new());
        let mut registry = EntityRegistry::new(factory, server_uri, recorder);
        for descriptor in descriptors {
            if let Err(error) = registry.create(descriptor) {
                return Err(OpenScopeError {
                    error: SetupError::Entity(error),
                    teardown: registry.teardown(),
                });
            }
        }
        debug!(target: SCOPE_TARGET, entities = registry.len(), "opened scope");
        Ok(Self { registry })
    }

    /// Entities of the scope.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Entities of the scope, for saving results.
    pub const fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Event streams of the scope's observed clients.
    #[must_use]
    pub fn recorder(&self) -> &EventRecorder {
        self.registry.recorder()
    }

    /// Releases every entity.
    #[must_use]
    pub fn close(mut self) -> TeardownReport {
        let report = self.registry.teardown();
        debug!(
            target: SCOPE_TARGET,
            released = report.released.len(),
            failures = report.failures.len(),
            "closed scope"
        );
        report
    }
}

/// Replaces the contents of each listed collection with its documents.
///
/// Collections are dropped and recreated through the internal client, so
/// seeding produces no events on observed clients.
///
/// # Errors
///
/// Returns [`SetupError::InitialData`] naming the namespace that failed.
pub fn seed(
    initial_data: &[CollectionData],
    internal_client: &Arc<dyn DatabaseClient>,
) -> Result<(), SetupError> {
    let options = CommandOptions::default();
    for data in initial_data {
        let database = Database::new(Arc::clone(internal_client), data.database_name.as_str());
        let collection = database.collection(data.collection_name.as_str());
        let failed = |source| SetupError::InitialData {
            namespace: collection.namespace(),
            source: Box::new(source),
        };
        database
            .drop_collection(&data.collection_name, &options)
            .map_err(failed)?;
        database
            .create_collection(&data.collection_name, &options)
            .map_err(failed)?;
        if !data.documents.is_empty() {
            collection
                .insert_many(data.documents.clone(), true, &options)
                .map_err(failed)?;
        }
        debug!(
            target: SCOPE_TARGET,
            namespace = collection.namespace(),
            documents = data.documents.len(),
            "seeded collection"
        );
    }
    Ok(())
}
