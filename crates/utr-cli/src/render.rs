//! Rendering of run reports.

use std::io::Write;

use serde::Serialize;
use utr_runner::{CaseReport, CaseStatus, FileReport, FileStatus, RunReport, RunSummary};

use crate::AppError;
use crate::cli::ResolvedOutputFormat;

/// JSON document written for `--output json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput<'a> {
    summary: RunSummary,
    files: &'a [FileReport],
}

pub(crate) fn write_report<W: Write>(
    report: &RunReport,
    format: ResolvedOutputFormat,
    out: &mut W,
) -> Result<(), AppError> {
    match format {
        ResolvedOutputFormat::Json => {
            let output = RunOutput {
                summary: report.summary(),
                files: &report.files,
            };
            serde_json::to_writer_pretty(&mut *out, &output).map_err(AppError::SerialiseReport)?;
            writeln!(out).map_err(AppError::WriteReport)
        }
        ResolvedOutputFormat::Human => write_human(report, out).map_err(AppError::WriteReport),
    }
}

fn write_human<W: Write>(report: &RunReport, out: &mut W) -> std::io::Result<()> {
    for file in &report.files {
        let name = file
            .path
            .as_ref()
            .map_or(file.description.as_str(), |path| path.as_str());
        writeln!(out, "{} {name}", file_label(file.status))?;
        if let Some(error) = &file.error {
            writeln!(out, "  error: {error}")?;
        }
        for case in &file.cases {
            write_case(case, out)?;
        }
    }
    let summary = report.summary();
    writeln!(
        out,
        "{} files: {} passed, {} failed, {} errored, {} skipped",
        summary.files, summary.passed, summary.failed, summary.errored, summary.skipped
    )
}

fn write_case<W: Write>(case: &CaseReport, out: &mut W) -> std::io::Result<()> {
    write!(out, "  {} {}", case_label(case.status), case.description)?;
    if let Some(index) = case.failing_operation {
        write!(out, " [operation {index}]")?;
    }
    match &case.message {
        Some(message) => writeln!(out, ": {message}"),
        None => writeln!(out),
    }
}

const fn file_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Passed => "PASS ",
        FileStatus::Failed => "FAIL ",
        FileStatus::Errored => "ERROR",
        FileStatus::Skipped => "SKIP ",
    }
}

const fn case_label(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Passed => "pass ",
        CaseStatus::Failed => "fail ",
        CaseStatus::Errored => "error",
        CaseStatus::Skipped => "skip ",
    }
}
