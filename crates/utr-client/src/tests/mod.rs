//! Unit tests for `utr_client`.

mod driver_tests;
mod query_tests;
mod update_tests;

use std::sync::{Arc, Mutex};

use utr_model::{Document, document_from_json};

use crate::{ClientEvent, EventListener};

/// Parses an Extended JSON object literal.
fn doc(json: serde_json::Value) -> Document {
    document_from_json(&json).expect("valid extended JSON document")
}

/// Listener that keeps every event it receives.
#[derive(Default)]
struct CollectingListener {
    events: Mutex<Vec<ClientEvent>>,
}

impl CollectingListener {
    fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().expect("listener lock").clone()
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|event| event.kind().as_str())
            .collect()
    }
}

impl EventListener for CollectingListener {
    fn handle(&self, event: &ClientEvent) {
        self.events.lock().expect("listener lock").push(event.clone());
    }
}
