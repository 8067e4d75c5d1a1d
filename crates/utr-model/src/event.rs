//! Names of the client events a test can observe and expect.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Event stream a kind belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventCategory {
    /// Command monitoring events.
    #[default]
    Command,
    /// Connection monitoring and pooling events.
    Cmap,
}

/// Kind of an observable client event, named as in test files.
///
/// # Example
///
/// ```
/// use utr_model::{EventCategory, EventKind};
///
/// let kind: EventKind = "commandStartedEvent".parse().expect("known kind");
/// assert_eq!(kind.category(), EventCategory::Command);
/// assert_eq!(kind.as_str(), "commandStartedEvent");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    /// A command was sent.
    CommandStartedEvent,
    /// A command returned a successful reply.
    CommandSucceededEvent,
    /// A command failed.
    CommandFailedEvent,
    /// A connection pool was created.
    PoolCreatedEvent,
    /// A connection pool became ready.
    PoolReadyEvent,
    /// A connection pool was cleared.
    PoolClearedEvent,
    /// A connection pool was closed.
    PoolClosedEvent,
    /// A connection was created.
    ConnectionCreatedEvent,
    /// A connection finished its handshake.
    ConnectionReadyEvent,
    /// A connection was closed.
    ConnectionClosedEvent,
    /// A connection checkout started.
    ConnectionCheckOutStartedEvent,
    /// A connection checkout failed.
    ConnectionCheckOutFailedEvent,
    /// A connection was checked out.
    ConnectionCheckedOutEvent,
    /// A connection was checked back in.
    ConnectionCheckedInEvent,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::CommandStartedEvent,
        Self::CommandSucceededEvent,
        Self::CommandFailedEvent,
        Self::PoolCreatedEvent,
        Self::PoolReadyEvent,
        Self::PoolClearedEvent,
        Self::PoolClosedEvent,
        Self::ConnectionCreatedEvent,
        Self::ConnectionReadyEvent,
        Self::ConnectionClosedEvent,
        Self::ConnectionCheckOutStartedEvent,
        Self::ConnectionCheckOutFailedEvent,
        Self::ConnectionCheckedOutEvent,
        Self::ConnectionCheckedInEvent,
    ];

    /// Name used in test files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Stream the kind belongs to.
    #[must_use]
    pub const fn category(self) -> EventCategory {
        match self {
            Self::CommandStartedEvent | Self::CommandSucceededEvent | Self::CommandFailedEvent => {
                EventCategory::Command
            }
            _ => EventCategory::Cmap,
        }
    }
}
