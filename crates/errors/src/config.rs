//! Configuration and job-description error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("project directory does not exist: {path}")]
    ProjectNotFound { path: String },

    #[error("project directory is not under version control: {path}")]
    NotVersionControlled { path: String },
}

impl ConfigError {
    /// Shorthand for a missing-field error
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Shorthand for an invalid-value error
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Pass --file to point at the job manifest."),
            Self::MissingField { field } => Some(match field.as_str() {
                "script" => "Add at least one command under `script` in the job manifest.",
                "php" | "runtime_version" => {
                    "Declare the runtime version (`php:`) in the manifest or pass --runtime."
                }
                _ => "Add the missing field noted in the error message.",
            }),
            Self::NotVersionControlled { .. } => {
                Some("Run `git init` in the project or point cibox at a git checkout.")
            }
            Self::InvalidValue { .. } | Self::Invalid { .. } | Self::ParseError { .. } => {
                Some("Fix the value and retry the command.")
            }
            Self::ProjectNotFound { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Invalid { .. } => "config.invalid",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::ProjectNotFound { .. } => "config.project_not_found",
            Self::NotVersionControlled { .. } => "config.not_version_controlled",
        };
        Some(code)
    }
}
