//! Per-client event streams captured from client listeners.
//!
//! Every observed client gets a [`RecordingListener`] at creation time. The
//! listener filters events by the client's `observeEvents` and
//! `ignoreCommandMonitoringEvents` settings and appends the survivors to the
//! client's stream under a global sequence number, so events keep one total
//! order even when they are delivered from several threads.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;
use utr_client::{ClientEvent, CommandStarted, EventListener};
use utr_model::{ClientDescriptor, EventCategory, EventKind};

const RECORDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::recorder");

/// Command whose monitoring events are never recorded.
const FAIL_POINT_COMMAND: &str = "configureFailPoint";

/// An event captured from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Position in the global recording order.
    pub sequence: u64,
    /// The event as published by the client.
    pub event: ClientEvent,
}

/// Position in the recording order; events recorded later compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventMark(u64);

impl EventMark {
    /// Position before the first recorded event.
    pub const ORIGIN: Self = Self(0);
}

/// Which events of a client are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    observed: HashSet<EventKind>,
    ignored_commands: HashSet<String>,
}

impl EventFilter {
    /// Filter built from a client descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &ClientDescriptor) -> Self {
        Self {
            observed: descriptor.observe_events.iter().copied().collect(),
            ignored_commands: descriptor
                .ignore_command_monitoring_events
                .iter()
                .cloned()
                .collect(),
        }
    }

    /// Whether any event kind is observed.
    #[must_use]
    pub fn observes_anything(&self) -> bool {
        !self.observed.is_empty()
    }

    /// Whether the event passes the filter.
    #[must_use]
    pub fn accepts(&self, event: &ClientEvent) -> bool {
        if !self.observed.contains(&event.kind()) {
            return false;
        }
        event.command_name().is_none_or(|name| {
            name != FAIL_POINT_COMMAND && !self.ignored_commands.contains(name)
        })
    }
}

/// Ordered event streams of every observed client in a file run.
#[derive(Debug, Default)]
pub struct EventRecorder {
    next_sequence: AtomicU64,
    streams: Mutex<HashMap<String, Vec<RecordedEvent>>>,
}

impl EventRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<String, Vec<RecordedEvent>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Listener that records the accepted events of one client.
    #[must_use]
    pub fn listener(
        self: &Arc<Self>,
        client_id: impl Into<String>,
        filter: EventFilter,
    ) -> Arc<dyn EventListener> {
        Arc::new(RecordingListener {
            client_id: client_id.into(),
            filter,
            recorder: Arc::clone(self),
        })
    }

    /// Appends an event to a client's stream.
    pub fn record(&self, client_id: &str, event: ClientEvent) {
        let mut streams = self.streams();
        // Sequence numbers are taken under the lock so each stream is
        // strictly increasing.
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        trace!(
            target: RECORDER_TARGET,
            client = client_id,
            sequence,
            kind = event.kind().as_str(),
            "recorded event"
        );
        streams
            .entry(client_id.to_owned())
            .or_default()
            .push(RecordedEvent { sequence, event });
    }

    /// Current position; events recorded after this call are "since" it.
    #[must_use]
    pub fn mark(&self) -> EventMark {
        let _streams = self.streams();
        EventMark(self.next_sequence.load(Ordering::SeqCst))
    }

    /// Discards a client's stream, for example when the client id is reused
    /// by a rebuilt entity.
    pub fn reset(&self, client_id: &str) {
        self.streams().remove(client_id);
    }

    /// Snapshot of a client's events whose kind is in `kinds`.
    #[must_use]
    pub fn events_for(&self, client_id: &str, kinds: &[EventKind]) -> Vec<RecordedEvent> {
        self.snapshot(client_id, |recorded| kinds.contains(&recorded.event.kind()))
    }

    /// Snapshot of a client's events of one category recorded after `mark`.
    #[must_use]
    pub fn events_since(
        &self,
        client_id: &str,
        mark: EventMark,
        category: EventCategory,
    ) -> Vec<RecordedEvent> {
        self.snapshot(client_id, |recorded| {
            recorded.sequence >= mark.0 && recorded.event.kind().category() == category
        })
    }

    /// Commands a client started after `mark`, oldest first.
    #[must_use]
    pub fn command_started_since(&self, client_id: &str, mark: EventMark) -> Vec<CommandStarted> {
        self.events_since(client_id, mark, EventCategory::Command)
            .into_iter()
            .filter_map(|recorded| match recorded.event {
                ClientEvent::CommandStarted(started) => Some(started),
                _ => None,
            })
            .collect()
    }

    fn snapshot(
        &self,
        client_id: &str,
        keep: impl Fn(&RecordedEvent) -> bool,
    ) -> Vec<RecordedEvent> {
        self.streams()
            .get(client_id)
            .map(|stream| stream.iter().filter(|recorded| keep(recorded)).cloned().collect())
            .unwrap_or_default()
    }
}

/// Listener attached to one observed client.
#[derive(Debug)]
pub struct RecordingListener {
    client_id: String,
    filter: EventFilter,
    recorder: Arc<EventRecorder>,
}

impl EventListener for RecordingListener {
    fn handle(&self, event: &ClientEvent) {
        if self.filter.accepts(event) {
            self.recorder.record(&self.client_id, event.clone());
        }
    }
}
