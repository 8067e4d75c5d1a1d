//! Configuration loading helpers for the CLI.
//!
//! Arguments are partitioned before parsing: flags listed in
//! [`CONFIG_CLI_FLAGS`](crate::CONFIG_CLI_FLAGS), with their values, go to
//! `ortho_config`, and everything else goes to the `utr` argument parser.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use utr_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the configuration flags of the command line.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn process_config_flag(argument: &OsStr) -> FlagAction {
    let Some(text) = argument.to_str() else {
        return FlagAction::Skip;
    };
    let (flag, inline_value) = match text.split_once('=') {
        Some((name, _)) => (name, true),
        None => (text, false),
    };
    if flag.starts_with("--") && crate::CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

/// Command line split between the configuration loader and the parser.
/// Both halves start with the program name.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) cli_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut split = ConfigArgumentSplit::default();
    let mut remaining = args.iter();
    if let Some(program) = remaining.next() {
        split.config_arguments.push(program.clone());
        split.cli_arguments.push(program.clone());
    }
    while let Some(argument) = remaining.next() {
        if argument.as_os_str() == OsStr::new("--") {
            split.cli_arguments.push(argument.clone());
            split.cli_arguments.extend(remaining.by_ref().cloned());
            break;
        }
        match process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                split.config_arguments.push(argument.clone());
                if needs_value && let Some(value) = remaining.next() {
                    split.config_arguments.push(value.clone());
                }
            }
            FlagAction::Skip => split.cli_arguments.push(argument.clone()),
        }
    }
    split
}
