//! Tests for argument handling and exit status.

use std::ffi::OsString;
use std::process::ExitCode;

use rstest::{fixture, rstest};
use utr_config::{Config, ConfigError};
use utr_model::Version;

use super::{StaticLoader, fixture};
use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

struct Output {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn run_cli<L: ConfigLoader>(args: &[OsString], loader: &L) -> Output {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = {
        let mut io = IoStreams::new(&mut stdout, &mut stderr, false);
        run_with_loader(args.to_vec(), &mut io, loader)
    };
    Output {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

fn args(values: &[&str]) -> Vec<OsString> {
    values.iter().map(OsString::from).collect()
}

#[fixture]
fn loader() -> StaticLoader {
    StaticLoader(Config::default())
}

#[rstest]
fn help_is_written_to_stdout(loader: StaticLoader) {
    let output = run_cli(&args(&["utr", "--help"]), &loader);
    assert_eq!(output.exit, ExitCode::SUCCESS);
    assert!(output.stdout.contains("Usage: utr"), "{}", output.stdout);
}

#[rstest]
fn missing_paths_are_a_usage_error(loader: StaticLoader) {
    let output = run_cli(&args(&["utr"]), &loader);
    assert_eq!(output.exit, ExitCode::from(2));
    assert!(output.stderr.contains("PATH"), "{}", output.stderr);
}

#[rstest]
fn configuration_failures_exit_with_usage_status() {
    struct FailingLoader;

    impl ConfigLoader for FailingLoader {
        fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
            Err(AppError::InvalidConfiguration(ConfigError::EmptyLogFilter))
        }
    }

    let output = run_cli(&[OsString::from("utr"), fixture("insert_one_lte.json")], &FailingLoader);
    assert_eq!(output.exit, ExitCode::from(2));
    assert!(output.stderr.contains("log_filter must not be empty"));
    assert!(output.stdout.is_empty());
}

#[rstest]
fn invalid_server_uri_is_rejected_before_running() {
    let loader = StaticLoader(Config {
        server_uri: "localhost:27017".to_owned(),
        ..Config::default()
    });
    let output = run_cli(&[OsString::from("utr"), fixture("insert_one_lte.json")], &loader);
    assert_eq!(output.exit, ExitCode::from(2));
    assert!(output.stderr.contains("must start with a scheme"));
}

#[rstest]
fn passing_files_exit_successfully_with_json_report(loader: StaticLoader) {
    let output = run_cli(
        &[
            OsString::from("utr"),
            OsString::from("--output"),
            OsString::from("json"),
            fixture("insert_one_lte.json"),
        ],
        &loader,
    );
    assert_eq!(output.exit, ExitCode::SUCCESS, "{}", output.stderr);
    let report: serde_json::Value = serde_json::from_str(&output.stdout).expect("json report");
    assert_eq!(report["summary"]["passed"], 1);
    assert_eq!(report["files"][0]["status"], "passed");
}

#[rstest]
fn failed_cases_exit_with_failure(loader: StaticLoader) {
    let output = run_cli(
        &[
            OsString::from("utr"),
            OsString::from("--output=human"),
            fixture("expect_error_success.json"),
        ],
        &loader,
    );
    assert_eq!(output.exit, ExitCode::from(1));
    assert!(output.stdout.contains("expected failure, got success"), "{}", output.stdout);
}

#[rstest]
fn server_version_drives_requirements() {
    let loader = StaticLoader(Config {
        server_version: Version::new(4, 0, 0),
        ..Config::default()
    });
    let output = run_cli(
        &[
            OsString::from("utr"),
            OsString::from("--output=human"),
            fixture("fail_point.json"),
        ],
        &loader,
    );
    assert_eq!(output.exit, ExitCode::SUCCESS);
    assert!(output.stdout.starts_with("SKIP "), "{}", output.stdout);
}
