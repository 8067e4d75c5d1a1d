//! Lifecycle states of file and case runs.

use std::fmt;

/// Where a file run is in its lifecycle.
///
/// Runs move `Loaded → EntitiesCreated → DataSeeded → Running(i) →
/// Completed`, or to `Aborted` from any state before `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Parsed and validated.
    Loaded,
    /// File-scoped entities exist.
    EntitiesCreated,
    /// Initial data written.
    DataSeeded,
    /// Running the case at this index.
    Running(usize),
    /// Every case ran.
    Completed,
    /// Stopped early by a file-level failure.
    Aborted,
}

impl FileState {
    /// Whether `next` may follow this state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Loaded, Self::EntitiesCreated | Self::Running(0) | Self::Completed)
                | (Self::EntitiesCreated, Self::DataSeeded)
                | (
                    Self::DataSeeded | Self::Running(_),
                    Self::Running(_) | Self::Completed
                )
                | (
                    Self::Loaded | Self::EntitiesCreated | Self::DataSeeded | Self::Running(_),
                    Self::Aborted
                )
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => formatter.write_str("loaded"),
            Self::EntitiesCreated => formatter.write_str("entities-created"),
            Self::DataSeeded => formatter.write_str("data-seeded"),
            Self::Running(index) => write!(formatter, "running({index})"),
            Self::Completed => formatter.write_str("completed"),
            Self::Aborted => formatter.write_str("aborted"),
        }
    }
}

/// Where a test case is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// Not started.
    Pending,
    /// Running operations.
    Executing,
    /// Checking events and outcome.
    Evaluating,
    /// Finished successfully.
    Passed,
    /// An operation or expectation failed.
    Failed,
    /// The case could not be interpreted.
    Errored,
    /// Not run.
    Skipped,
}

impl CaseState {
    /// Whether the case has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::Errored | Self::Skipped
        )
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Evaluating => "evaluating",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Skipped => "skipped",
        })
    }
}
