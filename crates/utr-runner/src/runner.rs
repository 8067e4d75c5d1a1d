//! File and case lifecycle.
//!
//! A file run validates the file, connects an internal client for seeding
//! and outcome checks, then runs each case against a [`Scope`]. Under file
//! isolation one scope serves every case and the initial data is rewritten
//! before each case; under test isolation every case builds its own scope.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};
use utr_client::{ClientFactory, ClientOptions, DatabaseClient, ServerInfo};
use utr_config::Config;
use utr_matcher::Matcher;
use utr_model::{Isolation, RunOnRequirement, TestCase, TestFile};

use crate::error::{CaseFailure, SetupError};
use crate::executor::{self, EnabledFailPoints, ExecutionContext};
use crate::expectations::{check_events, check_operation, check_outcome};
use crate::loader::load_test_file;
use crate::recorder::EventMark;
use crate::registry::EntityRegistry;
use crate::report::{CaseReport, FileReport, RunReport};
use crate::reporter::{RunReporter, StructuredRunReporter};
use crate::scope::{Scope, seed};
use crate::state::{CaseState, FileState};
use crate::validation::validate;

const RUNNER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");

/// File error recorded when a connection failure stops a file.
pub const CONNECTION_ABORT: &str = "aborted after connection failure";

/// Skip reason for cases of a file whose requirements are unmet.
const FILE_REQUIREMENTS_UNMET: &str = "file runOnRequirements not met";

/// Skip reason for a case whose requirements are unmet.
const CASE_REQUIREMENTS_UNMET: &str = "runOnRequirements not met";

/// Settings applied to every file a runner executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Connection string handed to the client factory.
    pub server_uri: String,
    /// Deadline for operations whose client sets none.
    pub operation_timeout: Option<Duration>,
    /// Overrides the isolation declared by files.
    pub isolation: Option<Isolation>,
}

impl RunnerSettings {
    /// Settings for the given connection string, without deadline or
    /// isolation override.
    #[must_use]
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self {
            server_uri: server_uri.into(),
            operation_timeout: None,
            isolation: None,
        }
    }

    /// Settings drawn from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_uri: config.server_uri().to_owned(),
            operation_timeout: config.operation_timeout(),
            isolation: config.isolation(),
        }
    }
}

/// Runs test files against clients from a factory.
#[derive(Debug)]
pub struct TestRunner {
    factory: Arc<dyn ClientFactory>,
    settings: RunnerSettings,
    reporter: Arc<dyn RunReporter>,
}

/// Case stopped by a failure, at an operation index or during evaluation.
struct CaseStop {
    operation: Option<usize>,
    failure: CaseFailure,
}

impl CaseStop {
    const fn at(index: usize, failure: CaseFailure) -> Self {
        Self {
            operation: Some(index),
            failure,
        }
    }

    const fn after_operations(failure: CaseFailure) -> Self {
        Self {
            operation: None,
            failure,
        }
    }
}

/// Progress of one file run.
struct FileRun<'r> {
    label: String,
    state: FileState,
    reporter: &'r dyn RunReporter,
    cases: Vec<CaseReport>,
}

impl<'r> FileRun<'r> {
    const fn new(label: String, reporter: &'r dyn RunReporter) -> Self {
        Self {
            label,
            state: FileState::Loaded,
            reporter,
            cases: Vec::new(),
        }
    }

    fn advance(&mut self, next: FileState) {
        if !self.state.can_advance_to(next) {
            warn!(
                target: RUNNER_TARGET,
                file = self.label.as_str(),
                from = %self.state,
                to = %next,
                "unexpected file state transition"
            );
        }
        self.reporter
            .file_state_changed(&self.label, self.state, next);
        self.state = next;
    }

    fn finish_case(&mut self, report: CaseReport) {
        self.reporter.case_finished(&self.label, &report);
        self.cases.push(report);
    }

    fn abandon_remaining(&mut self, cases: &[TestCase], reason: &str) {
        let remaining: Vec<_> = cases
            .iter()
            .skip(self.cases.len())
            .map(|case| CaseReport::abandoned(case.description.as_str(), reason))
            .collect();
        for report in remaining {
            self.finish_case(report);
        }
    }

    fn case_state(&self, case: &TestCase, state: CaseState) {
        debug!(
            target: RUNNER_TARGET,
            file = self.label.as_str(),
            case = case.description.as_str(),
            state = %state,
            "case state changed"
        );
    }

    /// Records how a case ended and decides whether the file continues.
    fn conclude(&mut self, case: &TestCase, result: Result<(), CaseStop>) -> Result<(), String> {
        let Err(stop) = result else {
            self.case_state(case, CaseState::Passed);
            self.finish_case(CaseReport::passed(case.description.as_str()));
            return Ok(());
        };
        let report = CaseReport::stopped(case.description.as_str(), stop.operation, &stop.failure);
        let state = match &stop.failure {
            CaseFailure::Specification(_) => CaseState::Errored,
            CaseFailure::Operation(_) | CaseFailure::Assertion(_) => CaseState::Failed,
        };
        self.case_state(case, state);
        self.finish_case(report);
        match stop.failure {
            CaseFailure::Specification(error) => Err(error.to_string()),
            CaseFailure::Operation(error) if error.is_connection_failure() => {
                Err(CONNECTION_ABORT.to_owned())
            }
            CaseFailure::Operation(_) | CaseFailure::Assertion(_) => Ok(()),
        }
    }
}

/// Why a case does not run, if it does not.
fn skip_reason(case: &TestCase, server: ServerInfo) -> Option<String> {
    if let Some(reason) = &case.skip_reason {
        return Some(reason.clone());
    }
    (!RunOnRequirement::any_met(&case.run_on_requirements, server.version, server.topology))
        .then(|| CASE_REQUIREMENTS_UNMET.to_owned())
}

impl TestRunner {
    /// Runner that reports through [`StructuredRunReporter`].
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, settings: RunnerSettings) -> Self {
        Self {
            factory,
            settings,
            reporter: Arc::new(StructuredRunReporter::new()),
        }
    }

    /// Replaces the reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Loads and runs each path in order.
    #[must_use]
    pub fn run_paths(&self, paths: &[Utf8PathBuf]) -> RunReport {
        let mut report = RunReport::default();
        for path in paths {
            report.push(self.run_path(path));
        }
        report
    }

    /// Loads and runs one file. A file that cannot be loaded is reported as
    /// errored without cases.
    #[must_use]
    pub fn run_path(&self, path: &Utf8Path) -> FileReport {
        match load_test_file(path) {
            Ok(file) => self.run_file(&file, Some(path)),
            Err(error) => {
                warn!(
                    target: RUNNER_TARGET,
                    file = path.as_str(),
                    error = %error,
                    "failed to load test file"
                );
                let report = FileReport::new(
                    Some(path.to_path_buf()),
                    path.as_str(),
                    Vec::new(),
                    Some(error.to_string()),
                );
                self.reporter.file_finished(&report);
                report
            }
        }
    }

    /// Runs a parsed file.
    ///
    /// A file-level failure (invalid file, setup failure, an error that
    /// cannot be attributed to one case) marks every case that did not
    /// finish as errored and is recorded as the file error.
    #[must_use]
    pub fn run_file(&self, file: &TestFile, path: Option<&Utf8Path>) -> FileReport {
        let label = path.map_or_else(|| file.description.clone(), ToString::to_string);
        info!(
            target: RUNNER_TARGET,
            file = label.as_str(),
            cases = file.tests.len(),
            "running test file"
        );
        let mut run = FileRun::new(label, self.reporter.as_ref());
        let error = match self.execute_file(file, &mut run) {
            Ok(()) => {
                run.advance(FileState::Completed);
                None
            }
            Err(message) => {
                warn!(
                    target: RUNNER_TARGET,
                    file = run.label.as_str(),
                    error = message.as_str(),
                    "test file aborted"
                );
                run.abandon_remaining(&file.tests, &message);
                run.advance(FileState::Aborted);
                Some(message)
            }
        };
        let report = FileReport::new(
            path.map(Utf8Path::to_path_buf),
            file.description.as_str(),
            run.cases,
            error,
        );
        self.reporter.file_finished(&report);
        report
    }

    fn execute_file(&self, file: &TestFile, run: &mut FileRun<'_>) -> Result<(), String> {
        validate(file).map_err(|error| error.to_string())?;
        let internal = self
            .factory
            .connect(&ClientOptions::new(self.settings.server_uri.as_str()))
            .map_err(|error| SetupError::InternalClient(error).to_string())?;
        let result = self.run_cases(file, &internal, run);
        if let Err(error) = internal.close() {
            warn!(
                target: RUNNER_TARGET,
                file = run.label.as_str(),
                error = %error,
                "failed to close internal client"
            );
        }
        result
    }

    fn run_cases(
        &self,
        file: &TestFile,
        internal: &Arc<dyn DatabaseClient>,
        run: &mut FileRun<'_>,
    ) -> Result<(), String> {
        let server = internal.server_info();
        if !RunOnRequirement::any_met(&file.run_on_requirements, server.version, server.topology) {
            for case in &file.tests {
                run.finish_case(CaseReport::skipped(
                    case.description.as_str(),
                    FILE_REQUIREMENTS_UNMET,
                ));
            }
            return Ok(());
        }
        let isolation = self
            .settings
            .isolation
            .or(file.isolation)
            .unwrap_or_default();
        debug!(
            target: RUNNER_TARGET,
            file = run.label.as_str(),
            isolation = %isolation,
            server_version = %server.version,
            topology = %server.topology,
            "starting cases"
        );
        match isolation {
            Isolation::File => self.run_shared(file, internal, server, run),
            Isolation::Test => self.run_isolated(file, internal, server, run),
        }
    }

    fn open_scope(&self, file: &TestFile, run: &FileRun<'_>) -> Result<Scope, String> {
        Scope::open(
            &file.create_entities,
            Arc::clone(&self.factory),
            &self.settings.server_uri,
        )
        .map_err(|failure| {
            if !failure.teardown.is_clean() {
                self.reporter.teardown_incomplete(&run.label, &failure.teardown);
            }
            failure.error.to_string()
        })
    }

    fn close_scope(&self, scope: Scope, run: &FileRun<'_>) {
        let report = scope.close();
        if !report.is_clean() {
            self.reporter.teardown_incomplete(&run.label, &report);
        }
    }

    /// One scope for every case; data is rewritten before each case after
    /// the first.
    fn run_shared(
        &self,
        file: &TestFile,
        internal: &Arc<dyn DatabaseClient>,
        server: ServerInfo,
        run: &mut FileRun<'_>,
    ) -> Result<(), String> {
        let mut scope = self.open_scope(file, run)?;
        run.advance(FileState::EntitiesCreated);
        let result = self.run_shared_cases(file, internal, server, &mut scope, run);
        self.close_scope(scope, run);
        result
    }

    fn run_shared_cases(
        &self,
        file: &TestFile,
        internal: &Arc<dyn DatabaseClient>,
        server: ServerInfo,
        scope: &mut Scope,
        run: &mut FileRun<'_>,
    ) -> Result<(), String> {
        seed(&file.initial_data, internal).map_err(|error| error.to_string())?;
        run.advance(FileState::DataSeeded);
        let mut data_fresh = true;
        for (index, case) in file.tests.iter().enumerate() {
            run.advance(FileState::Running(index));
            if let Some(reason) = skip_reason(case, server) {
                run.case_state(case, CaseState::Skipped);
                run.finish_case(CaseReport::skipped(case.description.as_str(), reason));
                continue;
            }
            // The first case to run also sees the events of entity creation.
            let mark = if data_fresh {
                EventMark::ORIGIN
            } else {
                seed(&file.initial_data, internal).map_err(|error| error.to_string())?;
                scope.recorder().mark()
            };
            data_fresh = false;
            let result = self.execute_case(case, scope.registry_mut(), internal, mark, run);
            run.conclude(case, result)?;
        }
        Ok(())
    }

    /// A fresh scope and fresh data for every case.
    fn run_isolated(
        &self,
        file: &TestFile,
        internal: &Arc<dyn DatabaseClient>,
        server: ServerInfo,
        run: &mut FileRun<'_>,
    ) -> Result<(), String> {
        for (index, case) in file.tests.iter().enumerate() {
            run.advance(FileState::Running(index));
            if let Some(reason) = skip_reason(case, server) {
                run.case_state(case, CaseState::Skipped);
                run.finish_case(CaseReport::skipped(case.description.as_str(), reason));
                continue;
            }
            let mut scope = self.open_scope(file, run)?;
            let outcome = match seed(&file.initial_data, internal) {
                Ok(()) => {
                    let result = self.execute_case(
                        case,
                        scope.registry_mut(),
                        internal,
                        EventMark::ORIGIN,
                        run,
                    );
                    run.conclude(case, result)
                }
                Err(error) => Err(error.to_string()),
            };
            self.close_scope(scope, run);
            outcome?;
        }
        Ok(())
    }

    /// Runs a case's operations, then checks its events and outcome.
    ///
    /// Events recorded from `mark` on are compared with the case's
    /// expectations. Fail points enabled by the case are disabled and saved results are
    /// discarded whatever the result.
    fn execute_case(
        &self,
        case: &TestCase,
        registry: &mut EntityRegistry,
        internal: &Arc<dyn DatabaseClient>,
        mark: EventMark,
        run: &FileRun<'_>,
    ) -> Result<(), CaseStop> {
        run.case_state(case, CaseState::Executing);
        let mut fail_points = EnabledFailPoints::new();
        let result = self
            .execute_operations(case, registry, internal, &mut fail_points)
            .and_then(|()| {
                run.case_state(case, CaseState::Evaluating);
                let matcher = Matcher::new(&*registry);
                check_events(&case.expect_events, registry.recorder(), mark, &matcher)
                    .and_then(|()| check_outcome(&case.outcome, internal, &matcher))
                    .map_err(CaseStop::after_operations)
            });
        let lingering = fail_points.disable_all();
        if !lingering.is_empty() {
            debug!(
                target: RUNNER_TARGET,
                file = run.label.as_str(),
                case = case.description.as_str(),
                failures = lingering.len(),
                "fail points left enabled"
            );
        }
        registry.discard_values();
        result
    }

    fn execute_operations(
        &self,
        case: &TestCase,
        registry: &mut EntityRegistry,
        internal: &Arc<dyn DatabaseClient>,
        fail_points: &mut EnabledFailPoints,
    ) -> Result<(), CaseStop> {
        for (index, operation) in case.operations.iter().enumerate() {
            let mut context = ExecutionContext {
                registry: &*registry,
                internal_client: internal,
                default_timeout: self.settings.operation_timeout,
                fail_points: &mut *fail_points,
            };
            let outcome = executor::execute(operation, &mut context)
                .map_err(|failure| CaseStop::at(index, failure))?;
            let saved = check_operation(operation, outcome, &Matcher::new(&*registry))
                .map_err(|failure| CaseStop::at(index, failure))?;
            if let (Some(id), Some(value)) = (operation.save_result_as_entity.as_deref(), saved) {
                registry
                    .save_value(id, value)
                    .map_err(|error| CaseStop::at(index, error.into()))?;
            }
        }
        Ok(())
    }
}
