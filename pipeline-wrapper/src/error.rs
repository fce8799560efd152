use std::path::PathBuf;

use thiserror::Error;

use crate::process::CommandFailure;
use crate::template::TemplateError;

/// Everything that can stop a wrapper run.
///
/// `Environment` and `User` errors are raised before the engine is spawned.
/// Engine failures never show up here; they are reported on
/// [`RunOutcome`](crate::RunOutcome) instead.
#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("{message}")]
    Environment { message: String },
    #[error("{message}")]
    User { message: String },
    #[error("Invalid config template: {0}")]
    Template(#[from] TemplateError),
    #[error("Invalid wrapper definition: {message}")]
    Definition { message: String },
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to change ownership of output files: {0}")]
    Ownership(CommandFailure),
}

impl WrapperError {
    pub fn environment(message: impl Into<String>) -> Self {
        WrapperError::Environment {
            message: message.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        WrapperError::User {
            message: message.into(),
        }
    }

    pub fn definition(message: impl Into<String>) -> Self {
        WrapperError::Definition {
            message: message.into(),
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WrapperError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WrapperError::Environment { .. } => "WRAPPER_ENVIRONMENT_ERROR",
            WrapperError::User { .. } => "WRAPPER_USER_ERROR",
            WrapperError::Template(_) => "WRAPPER_TEMPLATE_ERROR",
            WrapperError::Definition { .. } => "WRAPPER_DEFINITION_ERROR",
            WrapperError::Io { .. } => "WRAPPER_IO_ERROR",
            WrapperError::Ownership(_) => "WRAPPER_OWNERSHIP_ERROR",
        }
    }
}
