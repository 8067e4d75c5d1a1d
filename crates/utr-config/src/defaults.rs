use utr_model::{Topology, Version};

use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Connection string used when none is configured.
pub const DEFAULT_SERVER_URI: &str = "memory://";

/// Version reported by the in-memory server.
pub const DEFAULT_SERVER_VERSION: Version = Version::new(7, 0, 0);

/// Per-operation timeout in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned connection string used where allocation is required.
pub fn default_server_uri_string() -> String {
    DEFAULT_SERVER_URI.to_owned()
}

/// Server version assumed for the in-memory server.
pub fn default_server_version() -> Version {
    DEFAULT_SERVER_VERSION
}

/// Topology assumed for the in-memory server.
pub fn default_topology() -> Topology {
    Topology::Single
}

/// Per-operation timeout in milliseconds.
pub fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}
