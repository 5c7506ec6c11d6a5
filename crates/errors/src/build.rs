//! Image build error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("image build for {tag} failed with {}", describe_exit(.exit_code.as_ref()))]
    ImageBuildFailed {
        tag: String,
        exit_code: Option<i32>,
        /// Everything the engine printed during the build
        output: String,
    },
}

fn describe_exit(code: Option<&i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BuildError {
    /// Captured engine output, if this error carries any
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::ImageBuildFailed { output, .. } => Some(output),
        }
    }
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ImageBuildFailed { .. } => {
                Some("Re-run with --verbose to follow the build output live.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ImageBuildFailed { .. } => "build.image_build_failed",
        };
        Some(code)
    }
}
