//! Error taxonomy of the interpreter.
//!
//! Errors split by how far they reach: a [`SpecificationError`] or
//! [`SetupError`] stops the whole file, an [`OperationError`] or
//! [`AssertionMismatch`] fails one test case.

use std::fmt;
use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use utr_client::ClientError;
use utr_matcher::{MatchError, Mismatch};
use utr_model::{EntityKind, Version};

/// The test file cannot be interpreted as written.
#[derive(Debug, Clone, Error)]
pub enum SpecificationError {
    /// The file could not be read.
    #[error("failed to read test file {path}: {source}")]
    Read {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },

    /// The file is not a valid test file.
    #[error("malformed test file {path}: {source}")]
    Parse {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying deserialization failure.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The schema version is newer than, or incompatible with, the supported
    /// one.
    #[error("unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedSchemaVersion {
        /// Version declared by the file.
        found: Version,
        /// Newest supported version.
        supported: Version,
    },

    /// An identifier does not name a previously declared entity.
    #[error("{location} references undeclared entity '{id}'")]
    DanglingReference {
        /// Where the reference occurs.
        location: String,
        /// The unresolved identifier.
        id: String,
    },

    /// An identifier names an entity of the wrong kind.
    #[error("{location} expects a {expected} entity but '{id}' is a {actual}")]
    WrongReferenceKind {
        /// Where the reference occurs.
        location: String,
        /// The identifier.
        id: String,
        /// Kind required at that location.
        expected: EntityKind,
        /// Kind the identifier names.
        actual: EntityKind,
    },

    /// Two entities or two test cases share an identifier.
    #[error("duplicate {what} '{id}'")]
    Duplicate {
        /// What is duplicated (`entity id`, `test description`).
        what: &'static str,
        /// The repeated identifier.
        id: String,
    },

    /// No routing entry exists for the operation on that kind of object.
    #[error("unsupported operation '{name}' on {object}")]
    UnsupportedOperation {
        /// Object kind, or `testRunner`.
        object: String,
        /// Operation name.
        name: String,
    },

    /// An operation argument is missing or has the wrong shape.
    #[error("invalid arguments for '{operation}': {message}")]
    InvalidArgument {
        /// Operation name.
        operation: String,
        /// Description of the problem.
        message: String,
    },

    /// An expectation uses an unknown or malformed match operator.
    #[error("malformed expectation in {context}: {source}")]
    Expectation {
        /// Which expectation was being checked.
        context: String,
        /// Matcher failure.
        #[source]
        source: MatchError,
    },

    /// A runtime entity lookup failed.
    #[error(transparent)]
    Entity(#[from] RegistryError),
}

impl SpecificationError {
    /// Builds a [`SpecificationError::DanglingReference`].
    #[must_use]
    pub fn dangling(location: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DanglingReference {
            location: location.into(),
            id: id.into(),
        }
    }

    /// Builds a [`SpecificationError::UnsupportedOperation`].
    #[must_use]
    pub fn unsupported_operation(object: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            object: object.into(),
            name: name.into(),
        }
    }

    /// Builds a [`SpecificationError::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Builds a [`SpecificationError::Expectation`].
    #[must_use]
    pub fn expectation(context: impl Into<String>, source: MatchError) -> Self {
        Self::Expectation {
            context: context.into(),
            source,
        }
    }
}

/// Failures of the entity registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The identifier is already bound.
    #[error("entity '{id}' already exists")]
    DuplicateId {
        /// The identifier.
        id: String,
    },

    /// The parent of a new entity is missing or of the wrong kind.
    #[error("entity '{id}' requires {expected} '{parent}', which does not exist")]
    UnresolvedParent {
        /// Identifier of the entity being created.
        id: String,
        /// Identifier of the missing parent.
        parent: String,
        /// Kind the parent must have.
        expected: EntityKind,
    },

    /// The identifier is not bound.
    #[error("unknown entity '{id}'")]
    UnknownEntity {
        /// The identifier.
        id: String,
    },

    /// The identifier names an entity of another kind.
    #[error("entity '{id}' is a {actual}, not a {expected}")]
    WrongKind {
        /// The identifier.
        id: String,
        /// Kind that was requested.
        expected: EntityKind,
        /// Kind of the bound entity.
        actual: EntityKind,
    },

    /// The client library refused to create the entity.
    #[error("failed to create entity '{id}': {source}")]
    Client {
        /// Identifier of the entity being created.
        id: String,
        /// Client failure.
        #[source]
        source: Box<ClientError>,
    },
}

impl RegistryError {
    /// Builds a [`RegistryError::UnknownEntity`].
    #[must_use]
    pub fn unknown(id: impl Into<String>) -> Self {
        Self::UnknownEntity { id: id.into() }
    }

    /// Builds a [`RegistryError::WrongKind`].
    #[must_use]
    pub fn wrong_kind(id: impl Into<String>, expected: EntityKind, actual: EntityKind) -> Self {
        Self::WrongKind {
            id: id.into(),
            expected,
            actual,
        }
    }
}

/// Entities or initial data could not be set up.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    /// The internal client used for seeding and outcome checks failed to
    /// connect.
    #[error("failed to connect the internal client: {0}")]
    InternalClient(#[source] ClientError),

    /// An entity could not be created.
    #[error("entity setup failed: {0}")]
    Entity(#[from] RegistryError),

    /// Initial data could not be written.
    #[error("failed to seed {namespace}: {source}")]
    InitialData {
        /// `database.collection` being seeded.
        namespace: String,
        /// Client failure.
        #[source]
        source: Box<ClientError>,
    },
}

/// An operation failed without the test expecting it to.
#[derive(Debug, Clone, Error)]
#[error("operation '{operation}' failed: {source}")]
pub struct OperationError {
    /// Operation name.
    pub operation: String,
    /// Failure reported by the client.
    #[source]
    pub source: Box<ClientError>,
}

impl OperationError {
    /// Wraps the client failure of an operation.
    #[must_use]
    pub fn new(operation: impl Into<String>, source: ClientError) -> Self {
        Self {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure was a connection failure, which stops the rest of
    /// the file.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        self.source.is_network()
    }
}

/// An expectation did not hold.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionMismatch {
    /// Which expectation failed, for example `expectResult`.
    pub context: String,
    /// Short description.
    pub message: String,
    /// Divergence details from the matcher, when there are any.
    pub detail: Option<Box<Mismatch>>,
}

impl AssertionMismatch {
    /// A mismatch described only by a message.
    #[must_use]
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// A mismatch reported by the matcher.
    #[must_use]
    pub fn from_mismatch(context: impl Into<String>, mismatch: Box<Mismatch>) -> Self {
        Self {
            context: context.into(),
            message: mismatch.to_string(),
            detail: Some(mismatch),
        }
    }
}

impl fmt::Display for AssertionMismatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.context, self.message)
    }
}

impl std::error::Error for AssertionMismatch {}

/// Converts a matcher result into an assertion result, routing malformed
/// expectations to [`SpecificationError`].
pub(crate) fn classify_match(
    context: &str,
    result: Result<(), MatchError>,
) -> Result<(), CaseFailure> {
    match result {
        Ok(()) => Ok(()),
        Err(MatchError::Mismatch(mismatch)) => Err(CaseFailure::Assertion(
            AssertionMismatch::from_mismatch(context, mismatch),
        )),
        Err(other) => Err(CaseFailure::Specification(SpecificationError::expectation(
            context, other,
        ))),
    }
}

/// Why a test case stopped early.
#[derive(Debug, Clone, Error)]
pub enum CaseFailure {
    /// An operation failed unexpectedly.
    #[error(transparent)]
    Operation(OperationError),
    /// An expectation did not hold.
    #[error(transparent)]
    Assertion(AssertionMismatch),
    /// The case cannot be interpreted; the rest of the file is abandoned.
    #[error(transparent)]
    Specification(SpecificationError),
}

impl From<SpecificationError> for CaseFailure {
    fn from(error: SpecificationError) -> Self {
        Self::Specification(error)
    }
}

impl From<AssertionMismatch> for CaseFailure {
    fn from(mismatch: AssertionMismatch) -> Self {
        Self::Assertion(mismatch)
    }
}

impl From<RegistryError> for CaseFailure {
    fn from(error: RegistryError) -> Self {
        Self::Specification(SpecificationError::Entity(error))
    }
}
