//! Unit tests for the CLI runtime.

mod run_tests;

use std::ffi::OsString;

use utr_config::Config;

use crate::{AppError, ConfigLoader};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../utr-runner/tests/fixtures");

/// Loader that ignores the command line and returns a fixed configuration.
struct StaticLoader(Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

fn fixture(name: &str) -> OsString {
    OsString::from(format!("{FIXTURES}/{name}"))
}
