//! Collaborator interface between the interpreter and a database client.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use utr_model::{Document, ServerApi, Topology, Version};

use crate::error::ClientError;
use crate::event::EventListener;

/// Per-command options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions {
    /// Session identifier attached to the command as `lsid`.
    pub session: Option<Document>,
    /// Instant after which the command fails with a timeout.
    pub deadline: Option<Instant>,
}

impl CommandOptions {
    /// Options with a session attached.
    #[must_use]
    pub fn with_session(mut self, lsid: Option<Document>) -> Self {
        self.session = lsid;
        self
    }

    /// Options with a deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Version and topology reported by the server a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server version.
    pub version: Version,
    /// Deployment topology.
    pub topology: Topology,
}

/// Options used to create a client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Connection string.
    pub uri: String,
    /// Connection string options, such as `appName`.
    pub uri_options: Document,
    /// Declared API version appended to every command.
    pub server_api: Option<ServerApi>,
    /// Whether security-sensitive commands are published unredacted.
    pub observe_sensitive_commands: bool,
    /// Listeners subscribed before the pool is created, so they see its
    /// creation events.
    pub listeners: Vec<Arc<dyn EventListener>>,
}

impl ClientOptions {
    /// Options for the given connection string.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Application name from the URI options.
    #[must_use]
    pub fn app_name(&self) -> Option<&str> {
        self.uri_options.get_str("appName")
    }
}

/// A connected database client.
///
/// Every call blocks until the server replies or the deadline expires.
/// Implementations publish command and pool events to their listeners
/// synchronously with the call that caused them.
pub trait DatabaseClient: Send + Sync {
    /// Runs a command against a database and returns the reply.
    ///
    /// A reply with `ok: 0` is returned as [`ClientError::Server`].
    ///
    /// # Errors
    ///
    /// Returns the server, network or timeout failure of the command.
    fn run_command(
        &self,
        database: &str,
        command: Document,
        options: &CommandOptions,
    ) -> Result<Document, ClientError>;

    /// Starts a logical session and returns its identifier document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when the client is closed.
    fn start_session(&self) -> Result<Document, ClientError>;

    /// Ends a logical session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when the session is unknown.
    fn end_session(&self, lsid: &Document) -> Result<(), ClientError>;

    /// Whether a network error occurred while the session was in use.
    fn is_session_dirty(&self, lsid: &Document) -> bool;

    /// Subscribes a listener to the client's events.
    fn add_listener(&self, listener: Arc<dyn EventListener>);

    /// Version and topology of the server.
    fn server_info(&self) -> ServerInfo;

    /// Number of connections currently checked out of the pool.
    fn checked_out_connections(&self) -> usize;

    /// Closes the client and its connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when the client is already closed.
    fn close(&self) -> Result<(), ClientError>;
}

impl fmt::Debug for dyn DatabaseClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("DatabaseClient")
    }
}

/// Creates clients for a connection string scheme.
pub trait ClientFactory: Send + Sync {
    /// Connects a new client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] for unusable options and
    /// [`ClientError::Network`] when the server cannot be reached.
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn DatabaseClient>, ClientError>;
}

impl fmt::Debug for dyn ClientFactory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("ClientFactory")
    }
}
