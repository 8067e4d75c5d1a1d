//! Shared configuration for the test interpreter.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or `UTR_CONFIG_PATH`), then `UTR_*`
//! environment variables, then command-line flags.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utr_model::{Isolation, Topology, Version};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_SERVER_URI, DEFAULT_SERVER_VERSION,
    default_log_filter, default_log_filter_string, default_log_format,
    default_operation_timeout_ms, default_server_uri_string, default_server_version,
    default_topology,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Interpreter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "UTR")]
pub struct Config {
    /// Tracing filter directive, for example `info` or `utr_runner=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Connection string handed to the client factory.
    #[serde(default = "default_server_uri_string")]
    #[ortho_config(default = default_server_uri_string())]
    pub server_uri: String,
    /// Server version reported by the in-memory server.
    #[serde(default = "default_server_version")]
    #[ortho_config(default = default_server_version())]
    pub server_version: Version,
    /// Topology reported by the in-memory server.
    #[serde(default = "default_topology")]
    #[ortho_config(default = default_topology())]
    pub topology: Topology,
    /// Deadline applied to every operation; zero disables it.
    #[serde(default = "default_operation_timeout_ms")]
    #[ortho_config(default = default_operation_timeout_ms())]
    pub operation_timeout_ms: u64,
    /// Overrides the isolation declared by test files.
    #[serde(default)]
    pub isolation: Option<Isolation>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            server_uri: default_server_uri_string(),
            server_version: default_server_version(),
            topology: default_topology(),
            operation_timeout_ms: default_operation_timeout_ms(),
            isolation: None,
        }
    }
}

impl Config {
    /// Tracing filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Connection string handed to the client factory.
    #[must_use]
    pub fn server_uri(&self) -> &str {
        &self.server_uri
    }

    /// Server version reported by the in-memory server.
    #[must_use]
    pub const fn server_version(&self) -> Version {
        self.server_version
    }

    /// Topology reported by the in-memory server.
    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Per-operation deadline, or `None` when timeouts are disabled.
    #[must_use]
    pub const fn operation_timeout(&self) -> Option<Duration> {
        if self.operation_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.operation_timeout_ms))
        }
    }

    /// Isolation override, if configured.
    #[must_use]
    pub const fn isolation(&self) -> Option<Isolation> {
        self.isolation
    }

    /// Checks values the loader cannot validate on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty log filter or a connection
    /// string without a scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::EmptyLogFilter);
        }
        if !self
            .server_uri
            .split_once("://")
            .is_some_and(|(scheme, _)| !scheme.is_empty())
        {
            return Err(ConfigError::InvalidServerUri {
                uri: self.server_uri.clone(),
            });
        }
        Ok(())
    }
}

/// Errors raised by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The log filter is blank.
    #[error("log_filter must not be empty")]
    EmptyLogFilter,
    /// The connection string has no `scheme://` prefix.
    #[error("server_uri '{uri}' must start with a scheme such as memory://")]
    InvalidServerUri {
        /// Offending connection string.
        uri: String,
    },
}
