//! Behavioural tests for running test files using `rstest-bdd`.

use std::cell::RefCell;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use utr_client::memory::MemoryClientFactory;

use crate::report::{CaseReport, FileReport};
use crate::runner::{RunnerSettings, TestRunner};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

struct TestWorld {
    runner: TestRunner,
    path: Option<Utf8PathBuf>,
    report: Option<FileReport>,
}

impl TestWorld {
    fn new() -> Self {
        Self {
            runner: TestRunner::new(
                Arc::new(MemoryClientFactory::default()),
                RunnerSettings::new("memory://"),
            ),
            path: None,
            report: None,
        }
    }

    fn report(&self) -> &FileReport {
        self.report.as_ref().expect("file has not run")
    }

    fn case(&self, index: usize) -> &CaseReport {
        self.report()
            .cases
            .get(index)
            .unwrap_or_else(|| panic!("no case at index {index}"))
    }
}

fn status_name(status: impl serde::Serialize) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default()
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("the test file \"{name}\"")]
fn given_test_file(world: &RefCell<TestWorld>, name: String) {
    world.borrow_mut().path = Some(Utf8PathBuf::from(FIXTURES).join(name));
}

#[when("the runner executes the file")]
fn when_runner_executes(world: &RefCell<TestWorld>) {
    let mut state = world.borrow_mut();
    let path = state.path.clone().expect("test file not chosen");
    let report = state.runner.run_path(&path);
    state.report = Some(report);
}

#[then("the file status is \"{status}\"")]
fn then_file_status(world: &RefCell<TestWorld>, status: String) {
    let state = world.borrow();
    let report = state.report();
    assert_eq!(
        status_name(report.status),
        status,
        "unexpected file report: {report:?}"
    );
}

#[then("case {index} has status \"{status}\"")]
fn then_case_status(world: &RefCell<TestWorld>, index: usize, status: String) {
    let state = world.borrow();
    let case = state.case(index);
    assert_eq!(status_name(case.status), status, "unexpected case report: {case:?}");
}

#[then("case {index} reports \"{text}\"")]
fn then_case_message(world: &RefCell<TestWorld>, index: usize, text: String) {
    let state = world.borrow();
    let message = state.case(index).message.clone().unwrap_or_default();
    assert!(message.contains(&text), "message {message:?} lacks {text:?}");
}

#[then("the file error mentions \"{text}\"")]
fn then_file_error(world: &RefCell<TestWorld>, text: String) {
    let state = world.borrow();
    let error = state.report().error.clone().unwrap_or_default();
    assert!(error.contains(&text), "file error {error:?} lacks {text:?}");
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Bounded numeric expectations pass"
)]
fn bounded_numeric_expectations(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "An expected error that never happens fails the case"
)]
fn expected_error_never_happens(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Files written for a newer schema are rejected"
)]
fn newer_schema_rejected(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Dangling entity references stop the file before it runs"
)]
fn dangling_references_stop_the_file(world: RefCell<TestWorld>) {
    drop(world);
}
