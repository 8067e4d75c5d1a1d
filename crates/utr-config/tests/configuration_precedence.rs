use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use utr_config::{
    Config, DEFAULT_SERVER_URI, DEFAULT_SERVER_VERSION, default_log_filter, default_log_format,
};
use utr_model::{Isolation, Topology};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("utr")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: env_guard,
        }
    }

    fn write_config(&self, contents: &str) {
        let path = self.temp_dir.path().join("utr.toml");
        if let Err(error) = fs::write(&path, contents) {
            panic!("failed to write configuration: {error}");
        }

        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024; overrides are
        // restored in `Drop` while the mutex is still held.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => {
                *self.loaded.borrow_mut() = Some(config);
            }
            Err(error) => {
                *self.error.borrow_mut() = Some(error.to_string());
            }
        }
    }

    fn config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the server uri to \"{uri}\"")]
fn given_configuration_file(harness: &Harness, uri: String) {
    harness.write_config(&format!("server_uri = \"{uri}\"\n"));
}

#[given("the environment overrides the server uri to \"{uri}\"")]
fn given_environment_override(harness: &Harness, uri: String) {
    harness.set_env("UTR_SERVER_URI", &uri);
}

#[when("the CLI sets the server uri to \"{uri}\"")]
fn when_cli_override(harness: &Harness, uri: String) {
    harness.push_cli_arg("--server-uri");
    harness.push_cli_arg(OsString::from(&uri));
}

#[when("the CLI sets the isolation to \"{isolation}\"")]
fn when_cli_isolation(harness: &Harness, isolation: String) {
    harness.push_cli_arg("--isolation");
    harness.push_cli_arg(OsString::from(&isolation));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the server uri to \"{uri}\"")]
fn then_resolved_uri(harness: &Harness, uri: String) {
    assert_eq!(harness.config().server_uri(), uri);
}

#[then("loading the configuration resolves the isolation to \"{isolation}\"")]
fn then_resolved_isolation(harness: &Harness, isolation: String) {
    let expected = match isolation.parse::<Isolation>() {
        Ok(isolation) => isolation,
        Err(error) => panic!("invalid expected isolation '{isolation}': {error}"),
    };
    assert_eq!(harness.config().isolation(), Some(expected));
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.config();

    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.server_uri(), DEFAULT_SERVER_URI);
    assert_eq!(config.server_version(), DEFAULT_SERVER_VERSION);
    assert_eq!(config.topology(), Topology::Single);
    assert_eq!(config.isolation(), None);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_without_overrides(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Configuration file overrides defaults"
)]
fn file_overrides_defaults(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment overrides configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "CLI flags override environment and file"
)]
fn cli_overrides_everything(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "CLI selects per-test isolation"
)]
fn cli_selects_isolation(#[from(harness)] harness: Harness) {
    drop(harness);
}
