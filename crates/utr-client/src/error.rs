//! Errors reported by database clients.

use thiserror::Error;
use utr_model::{Document, Value};

/// Failure of a client operation.
///
/// Server errors come from a command reply with `ok: 0` or from a write error
/// inside an otherwise successful reply. The remaining variants are raised on
/// the client side.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The server rejected the command.
    #[error("server error {code} ({code_name}): {message}")]
    Server {
        /// Numeric error code.
        code: i32,
        /// Symbolic error code name.
        code_name: String,
        /// Server-supplied message.
        message: String,
        /// Error labels attached by the server.
        labels: Vec<String>,
        /// Partial result of a write that failed part way.
        partial_result: Option<Document>,
    },

    /// The driver layer refused the request (invalid arguments or state).
    #[error("client error: {message}")]
    Client {
        /// Description of the problem.
        message: String,
    },

    /// The connection failed while the command was in flight.
    #[error("network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
        /// Labels attached by the client, such as `RetryableWriteError`.
        labels: Vec<String>,
    },

    /// The operation deadline expired.
    #[error("operation timed out: {message}")]
    Timeout {
        /// Description of the expired operation.
        message: String,
    },
}

impl ClientError {
    /// Builds a [`ClientError::Server`] without labels or partial result.
    #[must_use]
    pub fn server(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            code_name: code_name.into(),
            message: message.into(),
            labels: Vec::new(),
            partial_result: None,
        }
    }

    /// Builds a [`ClientError::Server`] from an error reply or a write error
    /// entry (`code`, `codeName`, `errmsg`, `errorLabels`).
    #[must_use]
    pub fn from_reply(reply: &Document) -> Self {
        let code = reply
            .get_i64("code")
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or_default();
        let code_name = reply
            .get_str("codeName")
            .map_or_else(|| crate::codes::code_name(code).into_owned(), str::to_owned);
        let labels = reply
            .get_array("errorLabels")
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Self::Server {
            code,
            code_name,
            message: reply.get_str("errmsg").unwrap_or_default().to_owned(),
            labels,
            partial_result: None,
        }
    }

    /// Builds a [`ClientError::Client`].
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Builds a [`ClientError::Network`] without labels.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            labels: Vec::new(),
        }
    }

    /// Builds a [`ClientError::Timeout`].
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Attaches a partial result to a server error; other kinds are returned
    /// unchanged.
    #[must_use]
    pub fn with_partial_result(self, result: Document) -> Self {
        match self {
            Self::Server {
                code,
                code_name,
                message,
                labels,
                ..
            } => Self::Server {
                code,
                code_name,
                message,
                labels,
                partial_result: Some(result),
            },
            other => other,
        }
    }

    /// Message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Server { message, .. }
            | Self::Client { message }
            | Self::Network { message, .. }
            | Self::Timeout { message } => message,
        }
    }

    /// Server error code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Server error code name, if any.
    #[must_use]
    pub fn code_name(&self) -> Option<&str> {
        match self {
            Self::Server { code_name, .. } => Some(code_name),
            _ => None,
        }
    }

    /// Labels attached to the error.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        match self {
            Self::Server { labels, .. } | Self::Network { labels, .. } => labels,
            Self::Client { .. } | Self::Timeout { .. } => &[],
        }
    }

    /// Partial result carried by the error.
    #[must_use]
    pub const fn partial_result(&self) -> Option<&Document> {
        match self {
            Self::Server { partial_result, .. } => partial_result.as_ref(),
            _ => None,
        }
    }

    /// Whether the error originated on the client side rather than in a
    /// server reply.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Server { .. })
    }

    /// Whether the error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the error is a connection failure.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
