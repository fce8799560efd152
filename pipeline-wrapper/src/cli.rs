//! Command-line surface of a wrapper.
//!
//! [`build_arg_parser`] returns a `clap::Command` carrying the built-in
//! flags; workflows add their own arguments to it and hand the matches to
//! [`RunArgs::from_matches`].

use std::collections::BTreeMap;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::RunConfig;

pub const NO_CLEAN: &str = "no_clean";
pub const RESUME: &str = "resume";
/// Key under which the resolved host mount is exposed to config templates.
pub const OUTPUT_DIR: &str = "output_dir";

/// Built-in flags as requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub no_clean: bool,
    pub resume: bool,
}

/// Parsed arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    pub values: BTreeMap<String, String>,
    pub flags: RunFlags,
}

impl RunArgs {
    pub fn new(values: BTreeMap<String, String>, flags: RunFlags) -> Self {
        Self { values, flags }
    }

    /// Flattens `matches` into template values.
    ///
    /// `command` must be the command the matches came from. Flags whose
    /// feature is disabled in `config` are reported as unset.
    pub fn from_matches(command: &Command, matches: &ArgMatches, config: &RunConfig) -> Self {
        let flag = |id: &str| {
            matches
                .try_get_one::<bool>(id)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(false)
        };
        let flags = RunFlags {
            no_clean: config.allow_no_clean && flag(NO_CLEAN),
            resume: config.allow_resume && flag(RESUME),
        };
        Self {
            values: interpolation_values(command, matches),
            flags,
        }
    }
}

/// Template key for an argument id: dashes become underscores.
pub fn template_key(id: &str) -> String {
    id.replace('-', "_")
}

fn is_meta(arg: &Arg) -> bool {
    matches!(
        arg.get_action(),
        ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
    )
}

/// Every argument of `command` rendered as a string.
///
/// Multiple values are joined by a space; an argument that was not supplied
/// and has no default renders as the empty string.
pub fn interpolation_values(command: &Command, matches: &ArgMatches) -> BTreeMap<String, String> {
    command
        .get_arguments()
        .filter(|arg| !is_meta(arg))
        .map(|arg| {
            let id = arg.get_id().as_str();
            let value = matches
                .try_get_raw(id)
                .ok()
                .flatten()
                .map(|raw| {
                    raw.map(|v| v.to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            (template_key(id), value)
        })
        .collect()
}

pub fn build_arg_parser(config: &RunConfig) -> Command {
    let mut command = Command::new(config.name.clone()).about(config.description.clone());
    if config.allow_no_clean {
        command = command.arg(
            Arg::new(NO_CLEAN)
                .long("no-clean")
                .action(ArgAction::SetTrue)
                .help("If this flag is used, temporary work directory is not cleaned."),
        );
    }
    if config.allow_resume {
        command = command.arg(
            Arg::new(RESUME)
                .long("resume")
                .action(ArgAction::SetTrue)
                .help(
                    "If this flag is used, a previously uncleaned workflow in the same \
                     directory will be resumed",
                ),
        );
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(no_clean: bool, resume: bool) -> RunConfig {
        RunConfig::new("demo", "Demo workflow", "")
            .with_no_clean(no_clean)
            .with_resume(resume)
    }

    fn long_flags(command: &Command) -> Vec<String> {
        command
            .get_arguments()
            .filter_map(|a| a.get_long().map(str::to_string))
            .collect()
    }

    #[test]
    fn flags_follow_constructor_switches() {
        assert_eq!(
            long_flags(&build_arg_parser(&config(true, true))),
            vec!["no-clean", "resume"]
        );
        assert_eq!(long_flags(&build_arg_parser(&config(false, true))), vec!["resume"]);
        assert!(long_flags(&build_arg_parser(&config(false, false))).is_empty());
    }

    #[test]
    fn parser_carries_name_and_description() {
        let command = build_arg_parser(&config(true, true));
        assert_eq!(command.get_name(), "demo");
        assert_eq!(
            command.get_about().map(|s| s.to_string()),
            Some("Demo workflow".to_string())
        );
    }

    #[test]
    fn disabled_flag_is_rejected_by_parser() {
        let command = build_arg_parser(&config(false, true));
        assert!(command.try_get_matches_from(["demo", "--no-clean"]).is_err());
    }

    #[test]
    fn matches_flatten_into_values_and_flags() {
        let cfg = config(true, true);
        let command = build_arg_parser(&cfg)
            .arg(Arg::new("star-index").long("star-index").required(true))
            .arg(Arg::new("samples").long("samples").num_args(1..))
            .arg(Arg::new("note").long("note"))
            .arg(Arg::new("cores").long("cores").default_value("4"));
        let matches = command
            .clone()
            .try_get_matches_from([
                "demo",
                "--star-index",
                "s3://idx",
                "--samples",
                "a.fq",
                "b.fq",
                "--resume",
            ])
            .unwrap();

        let args = RunArgs::from_matches(&command, &matches, &cfg);
        assert_eq!(
            args.flags,
            RunFlags {
                no_clean: false,
                resume: true
            }
        );
        assert_eq!(args.values["star_index"], "s3://idx");
        assert_eq!(args.values["samples"], "a.fq b.fq");
        assert_eq!(args.values["note"], "");
        assert_eq!(args.values["cores"], "4");
        assert_eq!(args.values["resume"], "true");
        assert_eq!(args.values["no_clean"], "false");
        assert!(!args.values.contains_key("help"));
    }

    #[test]
    fn disabled_features_never_report_set() {
        let cfg = config(false, false);
        let command = build_arg_parser(&cfg);
        let matches = command.clone().try_get_matches_from(["demo"]).unwrap();
        let args = RunArgs::from_matches(&command, &matches, &cfg);
        assert_eq!(args.flags, RunFlags::default());
        assert!(args.values.is_empty());
    }
}
