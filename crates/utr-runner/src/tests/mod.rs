//! Unit tests for `utr_runner`.

mod expectations_tests;
mod runner_behaviour;
mod runner_tests;
mod support;

use std::sync::Arc;

use utr_client::memory::MemoryClientFactory;
use utr_client::{ClientFactory, ClientOptions, DatabaseClient};
use utr_model::{Document, EntityDescriptor, TestFile, Value, document_from_json, from_json};

use crate::recorder::EventRecorder;
use crate::registry::EntityRegistry;

/// Parses an Extended JSON object literal.
fn doc(json: serde_json::Value) -> Document {
    document_from_json(&json).expect("valid extended JSON document")
}

/// Parses an Extended JSON literal.
fn value(json: serde_json::Value) -> Value {
    from_json(&json).expect("valid extended JSON")
}

/// Parses a test file written as a JSON literal.
fn test_file(json: &serde_json::Value) -> TestFile {
    TestFile::from_json_str(&json.to_string()).expect("valid test file")
}

/// Parses one `createEntities` entry.
fn descriptor(json: serde_json::Value) -> EntityDescriptor {
    serde_json::from_value(json).expect("valid entity descriptor")
}

/// Registry backed by a fresh in-memory server.
fn memory_registry() -> (MemoryClientFactory, EntityRegistry) {
    let factory = MemoryClientFactory::default();
    let registry = EntityRegistry::new(
        Arc::new(factory.clone()),
        "memory://",
        Arc::new(EventRecorder::new()),
    );
    (factory, registry)
}

/// Registry holding `client0` (observing command events), `database0`,
/// `collection0` and `session0`.
fn populated_registry() -> (MemoryClientFactory, EntityRegistry) {
    let (factory, mut registry) = memory_registry();
    for json in [
        serde_json::json!({"client": {"id": "client0", "observeEvents": ["commandStartedEvent"]}}),
        serde_json::json!({"database": {"id": "database0", "client": "client0", "databaseName": "db"}}),
        serde_json::json!({"collection": {"id": "collection0", "database": "database0", "collectionName": "coll"}}),
        serde_json::json!({"session": {"id": "session0", "client": "client0"}}),
    ] {
        registry.create(&descriptor(json)).expect("entity created");
    }
    (factory, registry)
}

/// Unobserved client of the factory's server.
fn internal_client(factory: &MemoryClientFactory) -> Arc<dyn DatabaseClient> {
    factory
        .connect(&ClientOptions::new("memory://"))
        .expect("internal client")
}
