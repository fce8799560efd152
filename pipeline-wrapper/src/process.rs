//! Child-process execution.
//!
//! The engine invocation and the ownership fix-up both go through
//! [`CommandRunner`], so the orchestration in [`crate::runner`] can be driven
//! against a recording double in tests.

use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("command is empty")]
    Empty,
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Command '{command}' returned non-zero exit status {code}")]
    Status { command: String, code: i32 },
    #[error("Command '{command}' was terminated by a signal")]
    Signal { command: String },
}

/// Runs an argv to completion.
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> Result<(), CommandFailure>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String]) -> Result<(), CommandFailure> {
        (**self).run(argv)
    }
}

/// Spawns the program with inherited stdio and blocks until it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<(), CommandFailure> {
        let (program, args) = argv.split_first().ok_or(CommandFailure::Empty)?;
        let command_line = shell_join(argv);
        debug!(command = %command_line, "spawning child process");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| CommandFailure::Spawn {
                program: program.clone(),
                source,
            })?;
        check_status(&command_line, status)
    }
}

fn check_status(command: &str, status: ExitStatus) -> Result<(), CommandFailure> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(CommandFailure::Status {
            command: command.to_string(),
            code,
        }),
        None => Err(CommandFailure::Signal {
            command: command.to_string(),
        }),
    }
}

fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if !arg
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '\\' | '`'))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Renders an argv the way a shell user would type it, for logs and errors.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}


#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shell_join_quotes_only_when_needed() {
        let joined = shell_join(&argv(&["toil", "run", "/data/Toil x/jobStore", "", "it's"]));
        assert_eq!(joined, "toil run '/data/Toil x/jobStore' '' 'it'\\''s'");
    }

    #[test]
    fn empty_argv_is_rejected() {
        assert!(matches!(SystemRunner.run(&[]), Err(CommandFailure::Empty)));
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let err = SystemRunner
            .run(&argv(&["pipeline-wrapper-definitely-not-installed"]))
            .unwrap_err();
        assert!(matches!(err, CommandFailure::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_code() {
        let err = SystemRunner
            .run(&argv(&["sh", "-c", "exit 3"]))
            .unwrap_err();
        match err {
            CommandFailure::Status { code, command } => {
                assert_eq!(code, 3);
                assert_eq!(command, "sh -c 'exit 3'");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn successful_exit_is_ok() {
        SystemRunner.run(&argv(&["true"])).unwrap();
    }
}
