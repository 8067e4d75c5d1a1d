//! Tests for file and case lifecycle handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mockall::mock;
use rstest::{fixture, rstest};
use serde_json::json;
use utr_client::memory::{MemoryClientFactory, MemoryServer};
use utr_client::{ClientError, ClientFactory, ClientOptions, DatabaseClient};
use utr_model::{Isolation, Topology, Version, document_from_json};

use super::support::{RecordingRunReporter, RunEvent};
use super::test_file;
use crate::report::{CaseStatus, FileStatus};
use crate::reporter::RunReporter;
use crate::runner::{CONNECTION_ABORT, RunnerSettings, TestRunner};
use crate::state::FileState;

mock! {
    Factory {}
    impl ClientFactory for Factory {
        fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn DatabaseClient>, ClientError>;
    }
}

struct Harness {
    server: Arc<MemoryServer>,
    reporter: Arc<RecordingRunReporter>,
}

impl Harness {
    fn runner(&self, settings: RunnerSettings) -> TestRunner {
        let factory = MemoryClientFactory::new(Arc::clone(&self.server));
        TestRunner::new(Arc::new(factory), settings)
            .with_reporter(Arc::clone(&self.reporter) as Arc<dyn RunReporter>)
    }

    fn statuses(&self) -> Vec<CaseStatus> {
        self.reporter
            .events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::CaseFinished { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        server: Arc::new(MemoryServer::default()),
        reporter: Arc::new(RecordingRunReporter::default()),
    }
}

fn entities() -> serde_json::Value {
    json!([
        {"client": {"id": "client0", "observeEvents": ["commandStartedEvent"]}},
        {"database": {"id": "database0", "client": "client0", "databaseName": "db"}},
        {"collection": {"id": "collection0", "database": "database0", "collectionName": "coll"}},
        {"session": {"id": "session0", "client": "client0"}}
    ])
}

/// Two cases that each end `session0`; the second only passes when it gets
/// a fresh session.
fn session_file(isolation: Option<&str>) -> serde_json::Value {
    let end_session = json!({"name": "endSession", "object": "session0"});
    let mut file = json!({
        "description": "sessions per case",
        "schemaVersion": "1.0",
        "createEntities": entities(),
        "tests": [
            {"description": "first", "operations": [end_session.clone()]},
            {"description": "second", "operations": [end_session]}
        ]
    });
    if let (Some(mode), Some(object)) = (isolation, file.as_object_mut()) {
        object.insert("isolation".to_owned(), json!(mode));
    }
    file
}

#[rstest]
fn unsupported_schema_never_connects() {
    let mut factory = MockFactory::new();
    factory.expect_connect().times(0);
    let reporter = Arc::new(RecordingRunReporter::default());
    let runner = TestRunner::new(Arc::new(factory), RunnerSettings::new("memory://"))
        .with_reporter(Arc::clone(&reporter) as Arc<dyn RunReporter>);
    let file = test_file(&json!({
        "description": "from the future",
        "schemaVersion": "99.0",
        "tests": [{"description": "never runs", "operations": []}]
    }));

    let report = runner.run_file(&file, None);

    assert_eq!(report.status, FileStatus::Errored);
    assert!(report.error.as_deref().is_some_and(|error| error.contains("99.0.0")));
    assert_eq!(report.cases.len(), 1);
    assert_eq!(report.cases.first().map(|case| case.status), Some(CaseStatus::Errored));
    assert_eq!(reporter.file_states(), vec![FileState::Aborted]);
    assert_eq!(
        reporter.events().last(),
        Some(&RunEvent::FileFinished(FileStatus::Errored))
    );
}

#[rstest]
fn unmet_file_requirements_skip_every_case() {
    let reporter = Arc::new(RecordingRunReporter::default());
    let server = Arc::new(MemoryServer::new(Version::new(4, 0, 0), Topology::Single));
    let runner = TestRunner::new(
        Arc::new(MemoryClientFactory::new(server)),
        RunnerSettings::new("memory://"),
    )
    .with_reporter(Arc::clone(&reporter) as Arc<dyn RunReporter>);
    let file = test_file(&json!({
        "description": "newer servers",
        "schemaVersion": "1.0",
        "runOnRequirements": [{"minServerVersion": "4.4"}],
        "createEntities": entities(),
        "tests": [
            {"description": "a", "operations": []},
            {"description": "b", "operations": []}
        ]
    }));

    let report = runner.run_file(&file, None);

    assert_eq!(report.status, FileStatus::Skipped);
    assert!(report.cases.iter().all(|case| {
        case.status == CaseStatus::Skipped
            && case.message.as_deref() == Some("file runOnRequirements not met")
    }));
    assert_eq!(reporter.file_states(), vec![FileState::Completed]);
}

#[rstest]
#[case::shared(None, vec![CaseStatus::Passed, CaseStatus::Failed])]
#[case::declared_by_file(Some("test"), vec![CaseStatus::Passed, CaseStatus::Passed])]
fn isolation_decides_entity_lifetime(
    harness: Harness,
    #[case] isolation: Option<&str>,
    #[case] expected: Vec<CaseStatus>,
) {
    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_file(&test_file(&session_file(isolation)), None);

    assert_eq!(harness.statuses(), expected);
    assert_eq!(report.error, None);
}

#[rstest]
fn runner_settings_override_file_isolation(harness: Harness) {
    let settings = RunnerSettings {
        isolation: Some(Isolation::Test),
        ..RunnerSettings::new("memory://")
    };

    let report = harness
        .runner(settings)
        .run_file(&test_file(&session_file(Some("file"))), None);

    assert_eq!(report.status, FileStatus::Passed);
    assert_eq!(
        harness.reporter.file_states(),
        vec![FileState::Running(0), FileState::Running(1), FileState::Completed]
    );
}

#[rstest]
fn shared_scope_walks_every_state(harness: Harness) {
    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_file(&test_file(&session_file(None)), None);

    assert_eq!(report.status, FileStatus::Failed);
    assert_eq!(
        harness.reporter.file_states(),
        vec![
            FileState::EntitiesCreated,
            FileState::DataSeeded,
            FileState::Running(0),
            FileState::Running(1),
            FileState::Completed,
        ]
    );
    let second = report.cases.get(1).expect("second case");
    assert_eq!(second.failing_operation, Some(0));
    assert_eq!(
        second.message.as_deref(),
        Some("operation 'endSession' failed: client error: session has already ended")
    );
}

#[rstest]
fn connection_failure_abandons_the_file(harness: Harness) {
    let file = test_file(&json!({
        "description": "dropped connections",
        "schemaVersion": "1.0",
        "createEntities": entities(),
        "initialData": [{"databaseName": "db", "collectionName": "coll", "documents": []}],
        "tests": [
            {
                "description": "insert loses its connection",
                "operations": [
                    {
                        "name": "failPoint",
                        "object": "testRunner",
                        "arguments": {
                            "client": "client0",
                            "failPoint": {
                                "configureFailPoint": "failCommand",
                                "mode": {"times": 1},
                                "data": {"failCommands": ["insert"], "closeConnection": true}
                            }
                        }
                    },
                    {"name": "insertOne", "object": "collection0", "arguments": {"document": {"_id": 1}}}
                ]
            },
            {"description": "never reached", "operations": []}
        ]
    }));

    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_file(&file, None);

    assert_eq!(report.status, FileStatus::Errored);
    assert_eq!(report.error.as_deref(), Some(CONNECTION_ABORT));
    assert_eq!(harness.statuses(), vec![CaseStatus::Failed, CaseStatus::Errored]);
    assert_eq!(
        report.cases.get(1).and_then(|case| case.message.as_deref()),
        Some(CONNECTION_ABORT)
    );
    assert_eq!(harness.reporter.file_states().last(), Some(&FileState::Aborted));
}

#[rstest]
fn fail_points_do_not_outlive_their_case(harness: Harness) {
    let file = test_file(&json!({
        "description": "fail point cleanup",
        "schemaVersion": "1.0",
        "createEntities": entities(),
        "initialData": [{"databaseName": "db", "collectionName": "coll", "documents": []}],
        "tests": [
            {
                "description": "enables a fail point",
                "operations": [{
                    "name": "failPoint",
                    "object": "testRunner",
                    "arguments": {
                        "client": "client0",
                        "failPoint": {
                            "configureFailPoint": "failCommand",
                            "mode": "alwaysOn",
                            "data": {"failCommands": ["insert"], "errorCode": 11600}
                        }
                    }
                }]
            },
            {
                "description": "inserts freely",
                "operations": [
                    {"name": "insertOne", "object": "collection0", "arguments": {"document": {"_id": 1}}}
                ]
            }
        ]
    }));

    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_file(&file, None);

    assert_eq!(report.status, FileStatus::Passed);
    assert_eq!(
        harness.server.documents("db", "coll"),
        Some(vec![document_from_json(&json!({"_id": 1})).expect("document")])
    );
}

#[rstest]
fn entity_creation_failure_aborts_before_any_case() {
    let inner = MemoryClientFactory::default();
    let calls = AtomicUsize::new(0);
    let mut factory = MockFactory::new();
    factory.expect_connect().returning(move |options| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            inner.connect(options)
        } else {
            Err(ClientError::network("connection refused"))
        }
    });
    let reporter = Arc::new(RecordingRunReporter::default());
    let runner = TestRunner::new(Arc::new(factory), RunnerSettings::new("memory://"))
        .with_reporter(Arc::clone(&reporter) as Arc<dyn RunReporter>);

    let report = runner.run_file(&test_file(&session_file(None)), None);

    assert_eq!(report.status, FileStatus::Errored);
    assert!(
        report
            .error
            .as_deref()
            .is_some_and(|error| error.contains("connection refused"))
    );
    assert!(report.cases.iter().all(|case| case.status == CaseStatus::Errored));
    assert_eq!(reporter.file_states(), vec![FileState::Aborted]);
}

#[rstest]
fn unreadable_paths_are_reported_without_cases(harness: Harness) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("missing.json"))
        .expect("utf-8 path");

    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_path(&path);

    assert_eq!(report.status, FileStatus::Errored);
    assert!(report.cases.is_empty());
    assert_eq!(report.path.as_deref(), Some(path.as_path()));
    assert_eq!(
        harness.reporter.events(),
        vec![RunEvent::FileFinished(FileStatus::Errored)]
    );
}

fn pool_events(kinds: &[&str]) -> serde_json::Value {
    let events: Vec<_> = kinds.iter().map(|kind| json!({ (*kind): {} })).collect();
    json!([{"client": "client0", "eventType": "cmap", "events": events}])
}

/// Two inserts on a client observing pool and checkout events.
fn pool_file(isolation: &str, second_case: &[&str]) -> serde_json::Value {
    let insert = json!({
        "name": "insertOne",
        "object": "collection0",
        "arguments": {"document": {"_id": 1}}
    });
    let first_case = [
        "poolCreatedEvent",
        "poolReadyEvent",
        "connectionCheckedOutEvent",
        "connectionCheckedInEvent",
    ];
    json!({
        "description": "pool events",
        "schemaVersion": "1.0",
        "isolation": isolation,
        "createEntities": [
            {"client": {"id": "client0", "observeEvents": [
                "poolCreatedEvent",
                "poolReadyEvent",
                "connectionCheckedOutEvent",
                "connectionCheckedInEvent"
            ]}},
            {"database": {"id": "database0", "client": "client0", "databaseName": "db"}},
            {"collection": {"id": "collection0", "database": "database0", "collectionName": "coll"}}
        ],
        "initialData": [{"databaseName": "db", "collectionName": "coll", "documents": []}],
        "tests": [
            {
                "description": "first",
                "operations": [insert.clone()],
                "expectEvents": pool_events(&first_case)
            },
            {
                "description": "second",
                "operations": [insert],
                "expectEvents": pool_events(second_case)
            }
        ]
    })
}

#[rstest]
#[case::shared_scope("file", &["connectionCheckedOutEvent", "connectionCheckedInEvent"])]
#[case::scope_per_case(
    "test",
    &[
        "poolCreatedEvent",
        "poolReadyEvent",
        "connectionCheckedOutEvent",
        "connectionCheckedInEvent",
    ]
)]
fn pool_creation_events_belong_to_the_first_case_of_a_scope(
    harness: Harness,
    #[case] isolation: &str,
    #[case] second_case: &[&str],
) {
    let report = harness
        .runner(RunnerSettings::new("memory://"))
        .run_file(&test_file(&pool_file(isolation, second_case)), None);

    assert_eq!(report.status, FileStatus::Passed, "{report:#?}");
    assert_eq!(harness.statuses(), vec![CaseStatus::Passed, CaseStatus::Passed]);
}

#[rstest]
fn failed_entity_creation_reports_incomplete_rollback() {
    let inner = MemoryClientFactory::default();
    let calls = AtomicUsize::new(0);
    let mut factory = MockFactory::new();
    factory
        .expect_connect()
        .returning(move |options| match calls.fetch_add(1, Ordering::SeqCst) {
            0 => inner.connect(options),
            1 => {
                // Already closed, so releasing it during rollback fails.
                let client = inner.connect(options)?;
                client.close()?;
                Ok(client)
            }
            _ => Err(ClientError::network("connection refused")),
        });
    let reporter = Arc::new(RecordingRunReporter::default());
    let runner = TestRunner::new(Arc::new(factory), RunnerSettings::new("memory://"))
        .with_reporter(Arc::clone(&reporter) as Arc<dyn RunReporter>);
    let file = test_file(&json!({
        "description": "rollback",
        "schemaVersion": "1.0",
        "createEntities": [
            {"client": {"id": "client0"}},
            {"client": {"id": "client1"}}
        ],
        "tests": [{"description": "never runs", "operations": []}]
    }));

    let report = runner.run_file(&file, None);

    assert_eq!(report.status, FileStatus::Errored);
    assert!(
        reporter
            .events()
            .contains(&RunEvent::TeardownIncomplete { failures: 1 }),
        "{:?}",
        reporter.events()
    );
}
