//! `failCommand` fail points.

use std::time::Duration;

use utr_model::{Document, Value};

use crate::codes::{BAD_VALUE, FAILED_TO_PARSE};
use crate::memory::failure::{CommandFailure, CommandResult};

/// Name of the only fail point the in-memory server implements.
pub(crate) const FAIL_COMMAND: &str = "failCommand";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    AlwaysOn,
    Times(u64),
}

/// What a triggered fail point does to a command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FailAction {
    pub(crate) block: Option<Duration>,
    pub(crate) close_connection: bool,
    pub(crate) error: Option<CommandFailure>,
}

#[derive(Debug, Clone)]
struct FailPoint {
    mode: Mode,
    commands: Vec<String>,
    app_name: Option<String>,
    action: FailAction,
}

/// Active `failCommand` configuration.
#[derive(Debug, Default)]
pub(crate) struct FailPoints {
    active: Option<FailPoint>,
}

impl FailPoints {
    /// Applies a `configureFailPoint` command.
    pub(crate) fn configure(&mut self, command: &Document) -> CommandResult<()> {
        let name = command.get_str("configureFailPoint").ok_or_else(|| {
            CommandFailure::new(FAILED_TO_PARSE, "configureFailPoint requires a fail point name")
        })?;
        if name != FAIL_COMMAND {
            return Err(CommandFailure::new(
                BAD_VALUE,
                format!("unknown fail point: {name}"),
            ));
        }
        let mode = match command.get("mode") {
            Some(Value::String(text)) if text == "off" => {
                self.active = None;
                return Ok(());
            }
            Some(Value::String(text)) if text == "alwaysOn" => Mode::AlwaysOn,
            Some(Value::Document(mode)) => {
                let times = mode
                    .get_i64("times")
                    .and_then(|times| u64::try_from(times).ok())
                    .ok_or_else(|| {
                        CommandFailure::new(BAD_VALUE, "mode.times must be a non-negative integer")
                    })?;
                if times == 0 {
                    self.active = None;
                    return Ok(());
                }
                Mode::Times(times)
            }
            _ => return Err(CommandFailure::new(BAD_VALUE, "invalid fail point mode")),
        };
        let data = command
            .get_document("data")
            .ok_or_else(|| CommandFailure::new(BAD_VALUE, "failCommand requires data"))?;
        let commands = data
            .get_array("failCommands")
            .ok_or_else(|| CommandFailure::new(BAD_VALUE, "data.failCommands is required"))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();
        let block = (data.get_bool("blockConnection") == Some(true)).then(|| {
            let millis = data
                .get_i64("blockTimeMS")
                .and_then(|millis| u64::try_from(millis).ok())
                .unwrap_or(0);
            Duration::from_millis(millis)
        });
        let labels = data
            .get_array("errorLabels")
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let error = data
            .get_i64("errorCode")
            .and_then(|code| i32::try_from(code).ok())
            .map(|code| {
                CommandFailure::new(code, format!("Failing command via '{FAIL_COMMAND}' failpoint"))
                    .with_labels(labels)
            });
        self.active = Some(FailPoint {
            mode,
            commands,
            app_name: data.get_str("appName").map(str::to_owned),
            action: FailAction {
                block,
                close_connection: data.get_bool("closeConnection") == Some(true),
                error,
            },
        });
        Ok(())
    }

    /// Consumes one activation when the fail point applies to the command.
    pub(crate) fn trigger(
        &mut self,
        command_name: &str,
        app_name: Option<&str>,
    ) -> Option<FailAction> {
        let point = self.active.as_mut()?;
        if !point.commands.iter().any(|name| name == command_name) {
            return None;
        }
        if let Some(required) = &point.app_name
            && app_name != Some(required.as_str())
        {
            return None;
        }
        let action = point.action.clone();
        let mode = point.mode;
        match mode {
            Mode::AlwaysOn => {}
            Mode::Times(remaining) if remaining <= 1 => self.active = None,
            Mode::Times(remaining) => point.mode = Mode::Times(remaining - 1),
        }
        Some(action)
    }
}
