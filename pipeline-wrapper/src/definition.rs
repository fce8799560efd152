//! Wrapper definitions loaded from YAML by the `pipeline-wrapper` binary.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use clap::{Arg, ArgAction, Command};
use serde::Deserialize;
use tracing::debug;

use crate::cli::{template_key, OUTPUT_DIR};
use crate::template::{self, TemplateError};
use crate::{RunArgs, RunConfig, WrapperError};

const RESERVED_ARGUMENTS: [&str; 5] = ["no-clean", "resume", "help", "version", "output-dir"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WrapperDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: String,
    #[serde(default = "default_true")]
    pub no_clean: bool,
    #[serde(default = "default_true")]
    pub resume: bool,
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
    /// Arguments passed to the engine after the standard flags.
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArgumentSpec {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Boolean switch taking no value.
    #[serde(default)]
    pub flag: bool,
    /// Accepts one or more values.
    #[serde(default)]
    pub multiple: bool,
}

fn default_true() -> bool {
    true
}

impl ArgumentSpec {
    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone()).long(self.name.clone());
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        if self.flag {
            return arg.action(ArgAction::SetTrue);
        }
        arg = arg.value_name(template_key(&self.name).to_uppercase());
        if self.multiple {
            arg = arg.num_args(1..).action(ArgAction::Append);
        }
        if let Some(default) = &self.default {
            arg = arg.default_value(default.clone());
        }
        arg.required(self.required && self.default.is_none())
    }
}

impl WrapperDefinition {
    pub fn load(path: &Path) -> Result<Self, WrapperError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| WrapperError::io("Failed to read wrapper definition", path, err))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, WrapperError> {
        let interpolated = interpolate_env(raw);
        let definition: WrapperDefinition = serde_yaml::from_str(&interpolated)
            .map_err(|err| WrapperError::definition(err.to_string()))?;
        definition.validate()?;
        debug!(name = %definition.name, arguments = definition.arguments.len(), "loaded wrapper definition");
        Ok(definition)
    }

    pub fn validate(&self) -> Result<(), WrapperError> {
        if self.name.trim().is_empty() {
            return Err(WrapperError::definition("name cannot be empty"));
        }
        if self
            .name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace())
        {
            return Err(WrapperError::definition(format!(
                "name '{}' must not contain path separators or whitespace",
                self.name
            )));
        }

        let mut keys = BTreeSet::new();
        for arg in &self.arguments {
            if arg.name.trim().is_empty() || arg.name.starts_with('-') {
                return Err(WrapperError::definition(format!(
                    "argument name '{}' is invalid",
                    arg.name
                )));
            }
            let normalized = arg.name.replace('_', "-");
            if RESERVED_ARGUMENTS.contains(&normalized.as_str()) {
                return Err(WrapperError::definition(format!(
                    "argument name '{}' is reserved",
                    arg.name
                )));
            }
            if arg.flag && (arg.multiple || arg.default.is_some()) {
                return Err(WrapperError::definition(format!(
                    "flag argument '{}' cannot take values or defaults",
                    arg.name
                )));
            }
            if arg.flag && arg.required {
                return Err(WrapperError::definition(format!(
                    "flag argument '{}' cannot be required",
                    arg.name
                )));
            }
            if !keys.insert(template_key(&arg.name)) {
                return Err(WrapperError::definition(format!(
                    "argument '{}' is defined more than once",
                    arg.name
                )));
            }
        }

        let builtins = self
            .no_clean
            .then_some("no_clean")
            .into_iter()
            .chain(self.resume.then_some("resume"));
        let mut config_keys: Vec<&str> = keys.iter().map(String::as_str).chain(builtins).collect();
        let command_keys = config_keys.clone();
        config_keys.push(OUTPUT_DIR);

        template::check_keys(&self.config, config_keys.iter().copied())
            .map_err(|err| template_error("config", err))?;
        for part in &self.command {
            template::check_keys(part, command_keys.iter().copied())
                .map_err(|err| template_error("command", err))?;
        }
        Ok(())
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(
            self.name.clone(),
            self.description.clone(),
            self.config.clone(),
        )
        .with_no_clean(self.no_clean)
        .with_resume(self.resume)
    }

    /// The workflow's parser: built-in flags plus the defined arguments.
    pub fn command(&self) -> Command {
        let config = self.run_config();
        self.arguments
            .iter()
            .fold(crate::cli::build_arg_parser(&config), |cmd, spec| {
                cmd.arg(spec.to_arg())
            })
    }

    /// Engine arguments with placeholders filled from the parsed arguments.
    pub fn pipeline_command(&self, args: &RunArgs) -> Result<Vec<String>, WrapperError> {
        self.command
            .iter()
            .map(|part| template::render(part, &args.values).map_err(WrapperError::from))
            .collect()
    }
}

fn template_error(field: &str, err: TemplateError) -> WrapperError {
    WrapperError::definition(format!("{}: {}", field, err))
}

/// Expands `${VAR}` and `${VAR:-default}`; unset variables without a default
/// expand to the empty string.
fn interpolate_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let token = &rest[start + 2..start + 2 + len];
        let (key, default) = match token.split_once(":-") {
            Some((key, default)) => (key, Some(default)),
            None => (token, None),
        };
        let value = std::env::var(key)
            .ok()
            .or_else(|| default.map(str::to_string))
            .unwrap_or_default();
        out.push_str(&value);
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    out
}
