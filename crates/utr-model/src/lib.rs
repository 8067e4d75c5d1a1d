//! Data model for the unified test format interpreter.
//!
//! This crate holds the types shared by every layer of the interpreter: the
//! typed document value model and its Extended JSON encoding, dotted version
//! numbers, observable event names, and the declarative test file structure
//! (entities, operations, expectations).
//!
//! # Core types
//!
//! - [`Value`] and [`Document`]: typed, order-preserving document values
//! - [`from_json`] and [`to_json`]: Extended JSON conversion
//! - [`Version`]: schema and server versions
//! - [`EventKind`]: names of observable client events
//! - [`TestFile`], [`TestCase`] and [`Operation`]: the test file structure
//! - [`EntityDescriptor`]: declarative entity descriptions
//!
//! # Example
//!
//! ```
//! use utr_model::{Value, from_json};
//!
//! let json = serde_json::json!({"_id": 1, "n": {"$numberLong": "2"}});
//! let value = from_json(&json).expect("valid extended JSON");
//! let document = value.as_document().expect("document");
//! assert_eq!(document.get("n"), Some(&Value::Int64(2)));
//! ```

mod entity;
mod event;
mod extjson;
mod file;
mod value;
mod version;

pub use entity::{
    BucketDescriptor, BucketOptions, ClientDescriptor, CollectionDescriptor, DatabaseDescriptor,
    EntityDescriptor, EntityKind, ServerApi, SessionDescriptor,
};
pub use event::{EventCategory, EventKind};
pub use extjson::{ExtJsonError, document_from_json, document_to_json, from_json, to_json};
pub use file::{
    CollectionData, ExpectedError, ExpectedEvent, ExpectedEventError, ExpectedEventsForClient,
    Isolation, Operation, RunOnRequirement, TEST_RUNNER_OBJECT, TestCase, TestFile, Topology,
};
pub use value::{Binary, Decimal128, Document, ObjectId, Value};
pub use version::{SUPPORTED_SCHEMA_VERSION, Version, VersionParseError};

#[cfg(test)]
mod tests;
