//! Database client seam for the unified test format interpreter.
//!
//! The interpreter never talks to a server directly. It creates clients
//! through a [`ClientFactory`], sends commands through [`DatabaseClient`] and
//! observes them through [`EventListener`]s. On top of that seam this crate
//! provides:
//!
//! - [`driver`]: collection, database and file-bucket operations expressed as
//!   commands, with typed results
//! - [`memory`]: an in-memory server and client (`memory://`) with command
//!   monitoring, pool events and `failCommand` fail points
//! - [`codes`]: server error codes and their names
//!
//! # Example
//!
//! ```
//! use utr_client::memory::MemoryClientFactory;
//! use utr_client::driver::Database;
//! use utr_client::{ClientFactory, ClientOptions, CommandOptions};
//! use utr_model::Document;
//!
//! let factory = MemoryClientFactory::default();
//! let client = factory
//!     .connect(&ClientOptions::new("memory://"))
//!     .expect("memory client");
//! let collection = Database::new(client, "app").collection("users");
//! let mut user = Document::new();
//! user.insert("_id", 1);
//! collection
//!     .insert_one(user, &CommandOptions::default())
//!     .expect("insert succeeds");
//! assert_eq!(
//!     collection.estimated_document_count(&CommandOptions::default()).ok(),
//!     Some(1)
//! );
//! ```

mod client;
pub mod codes;
pub mod driver;
mod error;
mod event;
mod ids;
pub mod memory;
mod monitoring;

pub use client::{
    ClientFactory, ClientOptions, CommandOptions, DatabaseClient, ServerInfo,
};
pub use error::ClientError;
pub use event::{
    ClientEvent, CmapEvent, CommandFailed, CommandStarted, CommandSucceeded, EventListener,
};
pub use ids::{new_object_id, new_session_id, now_millis};
pub use monitoring::{is_sensitive_command, published_body};

#[cfg(test)]
mod tests;
