//! Serializable results of a run.

use camino::Utf8PathBuf;
use serde::Serialize;
use utr_matcher::Mismatch;
use utr_model::to_json;

use crate::error::{AssertionMismatch, CaseFailure};

/// Final status of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseStatus {
    /// Every operation and expectation held.
    Passed,
    /// An operation failed unexpectedly or an expectation did not hold.
    Failed,
    /// The case could not be interpreted, or the file was abandoned while it
    /// ran.
    Errored,
    /// Skipped by `skipReason` or unmet `runOnRequirements`.
    Skipped,
}

/// Where an expectation first diverged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Path to the divergence, such as `$.insertedId`.
    pub path: String,
    /// Expected subtree, as relaxed Extended JSON.
    pub expected: serde_json::Value,
    /// Actual subtree; absent when the key was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    /// Why the subtrees differ.
    pub reason: String,
}

impl From<&Mismatch> for Diagnostic {
    fn from(mismatch: &Mismatch) -> Self {
        Self {
            path: mismatch.path.to_string(),
            expected: to_json(&mismatch.expected),
            actual: mismatch.actual.as_ref().map(to_json),
            reason: mismatch.reason.clone(),
        }
    }
}

/// Result of one test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
    /// Case description.
    pub description: String,
    /// Final status.
    pub status: CaseStatus,
    /// Zero-based index of the operation that stopped the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_operation: Option<usize>,
    /// Failure description or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Matcher divergence, for assertion failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl CaseReport {
    /// A passed case.
    #[must_use]
    pub fn passed(description: impl Into<String>) -> Self {
        Self::with_status(description, CaseStatus::Passed)
    }

    /// A skipped case with its reason.
    #[must_use]
    pub fn skipped(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::with_status(description, CaseStatus::Skipped)
        }
    }

    /// An errored case that never ran because the file was abandoned.
    #[must_use]
    pub fn abandoned(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::with_status(description, CaseStatus::Errored)
        }
    }

    /// A case stopped by `failure` at operation `index`, or after its
    /// operations when `index` is `None`.
    #[must_use]
    pub fn stopped(
        description: impl Into<String>,
        index: Option<usize>,
        failure: &CaseFailure,
    ) -> Self {
        let (status, diagnostic) = match failure {
            CaseFailure::Assertion(AssertionMismatch { detail, .. }) => (
                CaseStatus::Failed,
                detail.as_deref().map(Diagnostic::from),
            ),
            CaseFailure::Operation(_) => (CaseStatus::Failed, None),
            CaseFailure::Specification(_) => (CaseStatus::Errored, None),
        };
        Self {
            failing_operation: index,
            message: Some(failure.to_string()),
            diagnostic,
            ..Self::with_status(description, status)
        }
    }

    fn with_status(description: impl Into<String>, status: CaseStatus) -> Self {
        Self {
            description: description.into(),
            status,
            failing_operation: None,
            message: None,
            diagnostic: None,
        }
    }
}

/// Final status of a test file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileStatus {
    /// Every case passed or was skipped, and at least one passed.
    Passed,
    /// At least one case failed.
    Failed,
    /// The file could not be interpreted or set up, or was abandoned.
    Errored,
    /// Every case was skipped.
    Skipped,
}

/// Result of one test file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Where the file was loaded from, when it came from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,
    /// File description.
    pub description: String,
    /// Final status.
    pub status: FileStatus,
    /// File-level error that stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Case results, in file order.
    pub cases: Vec<CaseReport>,
}

impl FileReport {
    /// Report of a file that ran to the end or was abandoned with `error`.
    #[must_use]
    pub fn new(
        path: Option<Utf8PathBuf>,
        description: impl Into<String>,
        cases: Vec<CaseReport>,
        error: Option<String>,
    ) -> Self {
        let status = if error.is_some()
            || cases.iter().any(|case| case.status == CaseStatus::Errored)
        {
            FileStatus::Errored
        } else if cases.iter().any(|case| case.status == CaseStatus::Failed) {
            FileStatus::Failed
        } else if cases.iter().all(|case| case.status == CaseStatus::Skipped) {
            FileStatus::Skipped
        } else {
            FileStatus::Passed
        };
        Self {
            path,
            description: description.into(),
            status,
            error,
            cases,
        }
    }

    /// Number of cases with the given status.
    #[must_use]
    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|case| case.status == status).count()
    }
}

/// Results of every file in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// File results, in run order.
    pub files: Vec<FileReport>,
}

/// Case counts across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Files run.
    pub files: usize,
    /// Files that errored.
    pub errored_files: usize,
    /// Passed cases.
    pub passed: usize,
    /// Failed cases.
    pub failed: usize,
    /// Errored cases.
    pub errored: usize,
    /// Skipped cases.
    pub skipped: usize,
}

impl RunSummary {
    /// Whether nothing failed or errored.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.errored_files == 0 && self.failed == 0 && self.errored == 0
    }
}

impl RunReport {
    /// Appends a file result.
    pub fn push(&mut self, file: FileReport) {
        self.files.push(file);
    }

    /// Case and file counts.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.files.iter().fold(
            RunSummary::default(),
            |summary, file| RunSummary {
                files: summary.files + 1,
                errored_files: summary.errored_files
                    + usize::from(file.status == FileStatus::Errored),
                passed: summary.passed + file.count(CaseStatus::Passed),
                failed: summary.failed + file.count(CaseStatus::Failed),
                errored: summary.errored + file.count(CaseStatus::Errored),
                skipped: summary.skipped + file.count(CaseStatus::Skipped),
            },
        )
    }
}
