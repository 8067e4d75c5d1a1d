//! In-memory database server and client.
//!
//! The server keeps databases in memory, executes the subset of commands the
//! driver layer issues and honours `failCommand` fail points. Clients created
//! by [`MemoryClientFactory`] share one server, so data written through one
//! client is visible to every other.

pub(crate) mod aggregate;
mod client;
pub(crate) mod fail_point;
pub(crate) mod failure;
pub(crate) mod query;
pub(crate) mod server;
pub(crate) mod update;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

pub use client::MemoryClient;
pub use server::MemoryServer;

use crate::client::{ClientFactory, ClientOptions, DatabaseClient};
use crate::error::ClientError;

/// Connection string scheme served by [`MemoryClientFactory`].
pub const MEMORY_SCHEME: &str = "memory://";

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Creates [`MemoryClient`]s connected to one shared [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryClientFactory {
    server: Arc<MemoryServer>,
}

impl MemoryClientFactory {
    /// Factory for clients of the given server.
    #[must_use]
    pub const fn new(server: Arc<MemoryServer>) -> Self {
        Self { server }
    }

    /// The server every client of this factory talks to.
    #[must_use]
    pub const fn server(&self) -> &Arc<MemoryServer> {
        &self.server
    }
}

impl Default for MemoryClientFactory {
    fn default() -> Self {
        Self::new(Arc::new(MemoryServer::default()))
    }
}

impl ClientFactory for MemoryClientFactory {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn DatabaseClient>, ClientError> {
        if !options.uri.starts_with(MEMORY_SCHEME) {
            return Err(ClientError::client(format!(
                "unsupported connection string '{}': only {MEMORY_SCHEME} is available",
                options.uri
            )));
        }
        debug!(
            target: concat!(env!("CARGO_PKG_NAME"), "::memory"),
            uri = options.uri.as_str(),
            "connecting in-memory client"
        );
        Ok(Arc::new(MemoryClient::new(
            Arc::clone(&self.server),
            options.clone(),
        )))
    }
}
