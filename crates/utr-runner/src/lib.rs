//! Interpreter for unified test format files.
//!
//! A [`TestRunner`] loads a test file, checks it with [`validate`], creates
//! its entities in an [`EntityRegistry`] and replays each case's operations
//! through the [`executor`]. Results, recorded events and final collection
//! contents are compared with the file's expectations by the value matcher,
//! and every case ends up in a serializable [`CaseReport`].
//!
//! The run of a file follows [`FileState`]:
//!
//! 1. `Loaded`: parsed and validated; an unsupported schema version or a
//!    dangling entity reference stops the file here.
//! 2. `EntitiesCreated`: the entities declared by the file exist.
//! 3. `DataSeeded`: initial data has been written through an internal,
//!    unobserved client.
//! 4. `Running(i)`: case `i` runs against the shared [`Scope`].
//! 5. `Completed` or `Aborted`.
//!
//! Lifecycle callbacks go to a [`RunReporter`]; [`StructuredRunReporter`]
//! emits them through `tracing`.

mod entity;
mod error;
pub mod executor;
mod expectations;
mod loader;
mod recorder;
mod registry;
mod report;
mod reporter;
mod runner;
mod scope;
mod state;
mod validation;

pub use entity::{
    BucketEntity, ClientEntity, CollectionEntity, DatabaseEntity, LiveEntity, SessionEntity,
};
pub use error::{
    AssertionMismatch, CaseFailure, OperationError, RegistryError, SetupError, SpecificationError,
};
pub use expectations::UNEXPECTED_SUCCESS;
pub use loader::{collect_test_files, load_test_file};
pub use recorder::{EventFilter, EventMark, EventRecorder, RecordedEvent, RecordingListener};
pub use registry::{EntityRegistry, TeardownFailure, TeardownReport};
pub use report::{
    CaseReport, CaseStatus, Diagnostic, FileReport, FileStatus, RunReport, RunSummary,
};
pub use reporter::{RunReporter, StructuredRunReporter};
pub use runner::{CONNECTION_ABORT, RunnerSettings, TestRunner};
pub use scope::{OpenScopeError, Scope, seed};
pub use state::{CaseState, FileState};
pub use validation::validate;

#[cfg(test)]
mod tests;
