//! Lifecycle callbacks of a run.

use std::fmt;
use std::sync::Arc;

use crate::registry::TeardownReport;
use crate::report::{CaseReport, FileReport};
use crate::state::FileState;

const REPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::report");

/// Observer notified as files and cases progress.
pub trait RunReporter: Send + Sync {
    /// Invoked when a file run moves to a new state.
    fn file_state_changed(&self, file: &str, from: FileState, to: FileState);

    /// Invoked after each case finishes or is skipped.
    fn case_finished(&self, file: &str, case: &CaseReport);

    /// Invoked when entity teardown reported failures.
    fn teardown_incomplete(&self, file: &str, report: &TeardownReport);

    /// Invoked once per file with its final report.
    fn file_finished(&self, report: &FileReport);
}

impl fmt::Debug for dyn RunReporter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("RunReporter")
    }
}

impl<T> RunReporter for Arc<T>
where
    T: RunReporter + ?Sized,
{
    fn file_state_changed(&self, file: &str, from: FileState, to: FileState) {
        (**self).file_state_changed(file, from, to);
    }

    fn case_finished(&self, file: &str, case: &CaseReport) {
        (**self).case_finished(file, case);
    }

    fn teardown_incomplete(&self, file: &str, report: &TeardownReport) {
        (**self).teardown_incomplete(file, report);
    }

    fn file_finished(&self, report: &FileReport) {
        (**self).file_finished(report);
    }
}

/// Default reporter that records run events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredRunReporter;

impl StructuredRunReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RunReporter for StructuredRunReporter {
    fn file_state_changed(&self, file: &str, from: FileState, to: FileState) {
        tracing::debug!(
            target: REPORT_TARGET,
            event = "file_state_changed",
            file,
            from = %from,
            to = %to,
            "file state changed"
        );
    }

    fn case_finished(&self, file: &str, case: &CaseReport) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "case_finished",
            file,
            case = case.description.as_str(),
            status = ?case.status,
            failing_operation = ?case.failing_operation,
            message = case.message.as_deref().unwrap_or_default(),
            "case finished"
        );
    }

    fn teardown_incomplete(&self, file: &str, report: &TeardownReport) {
        for failure in &report.failures {
            tracing::warn!(
                target: REPORT_TARGET,
                event = "teardown_failed",
                file,
                entity = failure.id.as_str(),
                error = %failure.error,
                "entity teardown failed"
            );
        }
    }

    fn file_finished(&self, report: &FileReport) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "file_finished",
            file = report.description.as_str(),
            status = ?report.status,
            cases = report.cases.len(),
            error = report.error.as_deref().unwrap_or_default(),
            "file finished"
        );
    }
}
