//! Test double for [`RunReporter`] that records lifecycle callbacks.

use std::sync::Mutex;

use crate::registry::TeardownReport;
use crate::report::{CaseReport, CaseStatus, FileReport, FileStatus};
use crate::reporter::RunReporter;
use crate::state::FileState;

/// Lifecycle callbacks observed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RunEvent {
    /// A file moved between states.
    FileState { from: FileState, to: FileState },
    /// A case finished with a status.
    CaseFinished { description: String, status: CaseStatus },
    /// Teardown left entities behind.
    TeardownIncomplete { failures: usize },
    /// A file finished with a status.
    FileFinished(FileStatus),
}

/// Records run events for assertions.
#[derive(Debug, Default)]
pub(super) struct RecordingRunReporter {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingRunReporter {
    /// Copy of the recorded events.
    pub(super) fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .expect("run reporter mutex poisoned")
            .clone()
    }

    /// File states visited, starting with the first target state.
    pub(super) fn file_states(&self) -> Vec<FileState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::FileState { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: RunEvent) {
        self.events
            .lock()
            .expect("run reporter mutex poisoned")
            .push(event);
    }
}

impl RunReporter for RecordingRunReporter {
    fn file_state_changed(&self, _file: &str, from: FileState, to: FileState) {
        self.record(RunEvent::FileState { from, to });
    }

    fn case_finished(&self, _file: &str, case: &CaseReport) {
        self.record(RunEvent::CaseFinished {
            description: case.description.clone(),
            status: case.status,
        });
    }

    fn teardown_incomplete(&self, _file: &str, report: &TeardownReport) {
        self.record(RunEvent::TeardownIncomplete {
            failures: report.failures.len(),
        });
    }

    fn file_finished(&self, report: &FileReport) {
        self.record(RunEvent::FileFinished(report.status));
    }
}
