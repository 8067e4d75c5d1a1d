//! Match failures and malformed match expressions.

use std::fmt;

use thiserror::Error;
use utr_model::Value;

use crate::path::MatchPath;

/// Details of the first divergence between expected and actual values.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Where the values diverge.
    pub path: MatchPath,
    /// Expected subtree at the divergence.
    pub expected: Value,
    /// Actual subtree at the divergence; `None` when the key is absent.
    pub actual: Option<Value>,
    /// Why the subtrees do not match.
    pub reason: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "at {}: {} (expected {}, actual ",
            self.path, self.reason, self.expected
        )?;
        match &self.actual {
            Some(actual) => write!(formatter, "{actual})"),
            None => formatter.write_str("<absent>)"),
        }
    }
}

/// Errors raised while matching.
///
/// Only [`MatchError::Mismatch`] describes actual data; the other variants
/// report a malformed expectation and should be treated as specification
/// errors by callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// Actual data does not satisfy the expectation.
    #[error("mismatch {0}")]
    Mismatch(Box<Mismatch>),

    /// A `$$`-prefixed operator is not registered.
    #[error("unsupported operator '{name}' at {path}")]
    UnsupportedOperator {
        /// Operator name, including the `$$` prefix.
        name: String,
        /// Location of the operator object.
        path: MatchPath,
    },

    /// An operator received an operand of the wrong shape.
    #[error("invalid operand for {operator} at {path}: {message}")]
    InvalidOperand {
        /// Operator name.
        operator: String,
        /// Location of the operator object.
        path: MatchPath,
        /// Description of the problem.
        message: String,
    },

    /// An operator referenced an entity that does not exist.
    #[error("{operator} at {path} references unknown entity '{id}'")]
    UnknownEntity {
        /// Operator name.
        operator: String,
        /// Location of the operator object.
        path: MatchPath,
        /// Entity identifier.
        id: String,
    },
}

impl MatchError {
    /// Builds a [`MatchError::Mismatch`].
    #[must_use]
    pub fn mismatch(
        path: &MatchPath,
        expected: &Value,
        actual: Option<&Value>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Mismatch(Box::new(Mismatch {
            path: path.clone(),
            expected: expected.clone(),
            actual: actual.cloned(),
            reason: reason.into(),
        }))
    }

    /// Builds a [`MatchError::InvalidOperand`].
    #[must_use]
    pub fn invalid_operand(operator: &str, path: &MatchPath, message: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.to_owned(),
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Builds a [`MatchError::UnknownEntity`].
    #[must_use]
    pub fn unknown_entity(operator: &str, path: &MatchPath, id: &str) -> Self {
        Self::UnknownEntity {
            operator: operator.to_owned(),
            path: path.clone(),
            id: id.to_owned(),
        }
    }

    /// Whether the error reports a malformed expectation rather than
    /// mismatching data.
    #[must_use]
    pub const fn is_specification_error(&self) -> bool {
        !matches!(self, Self::Mismatch(_))
    }

    /// Mismatch details, when the error is a mismatch.
    #[must_use]
    pub fn as_mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Mismatch(mismatch) => Some(mismatch),
            _ => None,
        }
    }
}
