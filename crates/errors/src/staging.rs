//! Build context staging errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StagingError {
    #[error("failed to create directory {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("failed to clear {path}: {message}")]
    RemoveDir { path: String, message: String },

    #[error("failed to copy {from} to {to}: {message}")]
    Copy {
        from: String,
        to: String,
        message: String,
    },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to set permissions on {path}: {message}")]
    Permissions { path: String, message: String },
}

impl StagingError {
    /// Build a copy error from an `io::Error`
    #[must_use]
    pub fn copy(err: &std::io::Error, from: &std::path::Path, to: &std::path::Path) -> Self {
        Self::Copy {
            from: from.display().to_string(),
            to: to.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Build a write error from an `io::Error`
    #[must_use]
    pub fn write(err: &std::io::Error, path: &std::path::Path) -> Self {
        Self::Write {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl UserFacingError for StagingError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Check free space and permissions of the temp root (--temp-root).")
    }

    fn is_retryable(&self) -> bool {
        true
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::CreateDir { .. } => "staging.create_dir",
            Self::RemoveDir { .. } => "staging.remove_dir",
            Self::Copy { .. } => "staging.copy",
            Self::Write { .. } => "staging.write",
            Self::Permissions { .. } => "staging.permissions",
        };
        Some(code)
    }
}
