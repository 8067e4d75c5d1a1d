//! Unit tests for `utr_matcher`.

mod diagnostics;
mod numeric_tests;
mod operator_tests;
mod structure_tests;

use utr_model::{Value, from_json};

/// Parses an Extended JSON literal for use in tests.
fn value(json: serde_json::Value) -> Value {
    from_json(&json).expect("valid extended JSON")
}
