//! Runs the bundled test files against the in-memory server.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use tempfile::TempDir;
use utr_client::memory::MemoryClientFactory;
use utr_runner::{
    CaseStatus, FileReport, FileStatus, RunnerSettings, TestRunner, UNEXPECTED_SUCCESS,
    collect_test_files,
};

fn fixtures() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[fixture]
fn runner() -> TestRunner {
    TestRunner::new(
        Arc::new(MemoryClientFactory::default()),
        RunnerSettings::new("memory://"),
    )
}

fn statuses(report: &FileReport) -> Vec<CaseStatus> {
    report.cases.iter().map(|case| case.status).collect()
}

#[rstest]
#[case("insert_one_lte.json", FileStatus::Passed, vec![CaseStatus::Passed])]
#[case(
    "expect_error_success.json",
    FileStatus::Failed,
    vec![CaseStatus::Failed, CaseStatus::Passed]
)]
#[case("unsupported_schema.json", FileStatus::Errored, vec![CaseStatus::Errored])]
#[case("dangling_reference.json", FileStatus::Errored, vec![CaseStatus::Errored])]
#[case(
    "fail_point.json",
    FileStatus::Passed,
    vec![CaseStatus::Passed, CaseStatus::Passed, CaseStatus::Skipped]
)]
#[case("sessions.json", FileStatus::Passed, vec![CaseStatus::Passed, CaseStatus::Passed])]
fn fixture_outcomes(
    runner: TestRunner,
    #[case] name: &str,
    #[case] file_status: FileStatus,
    #[case] case_statuses: Vec<CaseStatus>,
) {
    let report = runner.run_path(&fixtures().join(name));

    assert_eq!(report.status, file_status, "{report:#?}");
    assert_eq!(statuses(&report), case_statuses, "{report:#?}");
}

#[rstest]
fn unexpected_success_names_the_operation(runner: TestRunner) {
    let report = runner.run_path(&fixtures().join("expect_error_success.json"));

    let first = report.cases.first().expect("first case");
    assert_eq!(first.failing_operation, Some(0));
    assert!(
        first
            .message
            .as_deref()
            .is_some_and(|message| message.contains(UNEXPECTED_SUCCESS)),
        "{first:?}"
    );
}

#[rstest]
fn skipped_cases_keep_their_reason(runner: TestRunner) {
    let report = runner.run_path(&fixtures().join("fail_point.json"));

    let skipped = report.cases.get(2).expect("third case");
    assert_eq!(skipped.message.as_deref(), Some("runOnRequirements not met"));
}

#[rstest]
fn directories_expand_to_sorted_json_files(runner: TestRunner) {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    for name in ["sessions.json", "insert_one_lte.json"] {
        fs::copy(fixtures().join(name), root.join(name)).expect("copy fixture");
    }
    fs::write(root.join("notes.txt"), "not a test file").expect("write note");

    let files = collect_test_files(std::slice::from_ref(&root)).expect("listing");
    assert_eq!(
        files,
        vec![root.join("insert_one_lte.json"), root.join("sessions.json")]
    );

    let run = runner.run_paths(&files);
    let summary = run.summary();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.passed, 3);
    assert!(summary.is_success());
}

#[rstest]
fn whole_fixture_directory_reports_failures(runner: TestRunner) {
    let files = collect_test_files(&[fixtures()]).expect("listing");
    assert_eq!(files.len(), 6);

    let summary = runner.run_paths(&files).summary();

    assert_eq!(summary.errored_files, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert!(!summary.is_success());
}
