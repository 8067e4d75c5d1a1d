//! Command-line runtime for the unified test runner.
//!
//! The module owns argument parsing, configuration bootstrapping, telemetry
//! and report rendering. Test files run against the in-memory server, which
//! reports the configured server version and topology. The runtime can be
//! driven from the binary entrypoint or from tests where configuration
//! loading and IO streams are substituted.
//!
//! Exit status is `0` when every case passed or was skipped, `1` when any
//! case failed or errored, and `2` for configuration and usage errors.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::{debug, warn};
use utr_client::memory::{MemoryClientFactory, MemoryServer};
use utr_config::Config;
use utr_runner::{RunReport, RunnerSettings, TestRunner, collect_test_files};

mod cli;
mod config;
mod errors;
mod render;
mod telemetry;

use cli::Cli;
pub use cli::{OutputFormat, ResolvedOutputFormat};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use config::split_config_arguments;
pub(crate) use errors::AppError;
use errors::EXIT_FAILURE;

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the configuration fields
/// defined in `utr-config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--server-uri",
    "--server-version",
    "--topology",
    "--operation-timeout-ms",
    "--isolation",
];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E, stdout_is_terminal: bool) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E, stdout_is_terminal: bool) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr, stdout_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let arguments: Vec<OsString> = args.into_iter().collect();
    match execute(&arguments, io, loader) {
        Ok(exit_code) => exit_code,
        Err(AppError::CliUsage(error))
            if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            if let Err(write_error) = write!(io.stdout, "{}", error.render()) {
                warn!(target: CLI_TARGET, error = %write_error, "failed to write help");
                return ExitCode::from(EXIT_FAILURE);
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            if let Err(write_error) = writeln!(io.stderr, "utr: {error}") {
                warn!(target: CLI_TARGET, error = %write_error, "failed to report error");
            }
            error.exit_code()
        }
    }
}

fn execute<W, E, L>(
    args: &[OsString],
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> Result<ExitCode, AppError>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_config_arguments(args);
    let cli = Cli::try_parse_from(&split.cli_arguments).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    config.validate().map_err(AppError::InvalidConfiguration)?;
    telemetry::initialise(&config).map_err(AppError::Telemetry)?;

    let files = collect_test_files(&cli.paths)
        .map_err(|error| AppError::CollectFiles(Box::new(error)))?;
    debug!(target: CLI_TARGET, files = files.len(), "collected test files");
    let report = build_runner(&config).run_paths(&files);
    render::write_report(&report, cli.output.resolve(io.stdout_is_terminal), &mut *io.stdout)?;
    Ok(exit_code(&report))
}

/// Runner backed by an in-memory server shaped by the configuration.
fn build_runner(config: &Config) -> TestRunner {
    let server = MemoryServer::new(config.server_version(), config.topology());
    TestRunner::new(
        Arc::new(MemoryClientFactory::new(Arc::new(server))),
        RunnerSettings::from_config(config),
    )
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.summary().is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}

#[cfg(test)]
mod tests;
