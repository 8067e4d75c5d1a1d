//! Command failures raised inside the in-memory server.

use utr_model::{Document, Value};

use crate::codes::code_name;

/// A command failure, rendered as an `ok: 0` reply or a write error.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandFailure {
    pub(crate) code: i32,
    pub(crate) message: String,
    pub(crate) labels: Vec<String>,
}

impl CommandFailure {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            labels: Vec::new(),
        }
    }

    pub(crate) fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Error reply with `ok: 0`.
    pub(crate) fn to_reply(&self) -> Document {
        let mut reply = Document::new();
        reply.insert("ok", Value::Double(0.0));
        reply.insert("errmsg", self.message.as_str());
        reply.insert("code", self.code);
        reply.insert("codeName", code_name(self.code).into_owned());
        if !self.labels.is_empty() {
            let labels = self.labels.iter().map(|label| Value::from(label.as_str()));
            reply.insert("errorLabels", labels.collect::<Vec<_>>());
        }
        reply
    }

    /// Entry of a `writeErrors` array.
    pub(crate) fn to_write_error(&self, index: usize) -> Document {
        let mut entry = Document::new();
        entry.insert("index", i64::try_from(index).unwrap_or(i64::MAX));
        entry.insert("code", self.code);
        entry.insert("codeName", code_name(self.code).into_owned());
        entry.insert("errmsg", self.message.as_str());
        entry
    }
}

/// Result of a command handler.
pub(crate) type CommandResult<T> = Result<T, CommandFailure>;

pub(crate) fn missing_field(command: &str, field: &str) -> CommandFailure {
    CommandFailure::new(
        crate::codes::FAILED_TO_PARSE,
        format!("BSON field '{command}.{field}' is missing but a required field"),
    )
}

pub(crate) fn wrong_type(command: &str, field: &str, expected: &str) -> CommandFailure {
    CommandFailure::new(
        crate::codes::TYPE_MISMATCH,
        format!("BSON field '{command}.{field}' is the wrong type, expected type '{expected}'"),
    )
}
