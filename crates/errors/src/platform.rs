//! Platform (subprocess) operation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur while driving external programs
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PlatformError {
    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("lost contact with process {command}: {message}")]
    ProcessWaitFailed { command: String, message: String },
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandNotFound { .. } | Self::ProcessExecutionFailed { .. } => Some(
                "Make sure the container engine is installed and on PATH (see --engine).",
            ),
            Self::ProcessWaitFailed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ProcessExecutionFailed { .. } => "platform.process_execution_failed",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::ProcessWaitFailed { .. } => "platform.process_wait_failed",
        };
        Some(code)
    }
}
