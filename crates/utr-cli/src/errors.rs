//! Error types and exit codes for the CLI runtime.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use utr_config::ConfigError;
use utr_runner::SpecificationError;

use crate::telemetry::TelemetryError;

/// Exit status when a case failed or errored, or the report could not be
/// written.
pub(crate) const EXIT_FAILURE: u8 = 1;

/// Exit status for configuration and usage errors.
pub(crate) const EXIT_USAGE: u8 = 2;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(ConfigError),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("{0}")]
    Telemetry(TelemetryError),
    #[error("failed to collect test files: {0}")]
    CollectFiles(Box<SpecificationError>),
    #[error("failed to serialise run report: {0}")]
    SerialiseReport(serde_json::Error),
    #[error("failed to write run report: {0}")]
    WriteReport(io::Error),
}

impl AppError {
    /// Process exit status for the error.
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::SerialiseReport(_) | Self::WriteReport(_) => ExitCode::from(EXIT_FAILURE),
            Self::LoadConfiguration(_)
            | Self::InvalidConfiguration(_)
            | Self::CliUsage(_)
            | Self::Telemetry(_)
            | Self::CollectFiles(_) => ExitCode::from(EXIT_USAGE),
        }
    }
}
