//! Command monitoring and connection pool events published by clients.

use std::fmt;

use utr_model::{Document, EventKind, Value};

/// Receives events published by a client.
///
/// Listeners are called synchronously on the thread that issued the
/// operation, possibly from several threads at once.
pub trait EventListener: Send + Sync {
    /// Handles one event.
    fn handle(&self, event: &ClientEvent);
}

impl fmt::Debug for dyn EventListener {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("EventListener")
    }
}

/// A command was sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStarted {
    /// Command name (the first key of the command).
    pub command_name: String,
    /// Target database.
    pub database_name: String,
    /// Command document as sent, or empty when redacted.
    pub command: Document,
    /// Identifier correlating the started and completed events.
    pub request_id: i64,
    /// Connection the command was sent on.
    pub connection_id: u64,
}

/// A command completed with `ok: 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSucceeded {
    /// Command name.
    pub command_name: String,
    /// Target database.
    pub database_name: String,
    /// Reply document, or empty when redacted.
    pub reply: Document,
    /// Identifier correlating the started and completed events.
    pub request_id: i64,
    /// Connection the command was sent on.
    pub connection_id: u64,
    /// Round-trip duration in microseconds.
    pub duration_micros: u64,
}

/// A command failed with `ok: 0` or a transport error.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailed {
    /// Command name.
    pub command_name: String,
    /// Target database.
    pub database_name: String,
    /// Description of the failure.
    pub failure: String,
    /// Identifier correlating the started and completed events.
    pub request_id: i64,
    /// Connection the command was sent on.
    pub connection_id: u64,
    /// Round-trip duration in microseconds.
    pub duration_micros: u64,
}

/// A connection pool or connection lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub struct CmapEvent {
    /// Which pool or connection event occurred.
    pub kind: EventKind,
    /// Server address the pool belongs to.
    pub address: String,
    /// Connection concerned, for connection-level events.
    pub connection_id: Option<u64>,
    /// Why a connection closed or a checkout failed.
    pub reason: Option<String>,
}

/// Event published by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// See [`CommandStarted`].
    CommandStarted(CommandStarted),
    /// See [`CommandSucceeded`].
    CommandSucceeded(CommandSucceeded),
    /// See [`CommandFailed`].
    CommandFailed(CommandFailed),
    /// See [`CmapEvent`].
    Cmap(CmapEvent),
}

impl ClientEvent {
    /// Kind name used in test files.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::CommandStarted(_) => EventKind::CommandStartedEvent,
            Self::CommandSucceeded(_) => EventKind::CommandSucceededEvent,
            Self::CommandFailed(_) => EventKind::CommandFailedEvent,
            Self::Cmap(event) => event.kind,
        }
    }

    /// Command name for command monitoring events.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        match self {
            Self::CommandStarted(event) => Some(&event.command_name),
            Self::CommandSucceeded(event) => Some(&event.command_name),
            Self::CommandFailed(event) => Some(&event.command_name),
            Self::Cmap(_) => None,
        }
    }

    /// Session identifier attached to a started command.
    #[must_use]
    pub fn lsid(&self) -> Option<&Document> {
        match self {
            Self::CommandStarted(event) => event.command.get_document("lsid"),
            _ => None,
        }
    }

    /// Renders the event as the document expected events are matched
    /// against, using the field names of the test format.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        match self {
            Self::CommandStarted(event) => {
                document.insert("command", event.command.clone());
                document.insert("commandName", event.command_name.as_str());
                document.insert("databaseName", event.database_name.as_str());
                document.insert("requestId", event.request_id);
                document.insert("connectionId", unsigned_value(event.connection_id));
            }
            Self::CommandSucceeded(event) => {
                document.insert("reply", event.reply.clone());
                document.insert("commandName", event.command_name.as_str());
                document.insert("databaseName", event.database_name.as_str());
                document.insert("requestId", event.request_id);
                document.insert("connectionId", unsigned_value(event.connection_id));
                document.insert("duration", unsigned_value(event.duration_micros));
            }
            Self::CommandFailed(event) => {
                document.insert("failure", event.failure.as_str());
                document.insert("commandName", event.command_name.as_str());
                document.insert("databaseName", event.database_name.as_str());
                document.insert("requestId", event.request_id);
                document.insert("connectionId", unsigned_value(event.connection_id));
                document.insert("duration", unsigned_value(event.duration_micros));
            }
            Self::Cmap(event) => {
                document.insert("address", event.address.as_str());
                if let Some(connection_id) = event.connection_id {
                    document.insert("connectionId", unsigned_value(connection_id));
                }
                if let Some(reason) = &event.reason {
                    document.insert("reason", reason.as_str());
                }
            }
        }
        document
    }
}

fn unsigned_value(number: u64) -> Value {
    i64::try_from(number).map_or(Value::Null, Value::Int64)
}
