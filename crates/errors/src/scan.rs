//! Project file listing errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ScanError {
    #[error("listing tracked files in {dir} failed ({status}): {diagnostic}")]
    ListingFailed {
        dir: String,
        status: String,
        diagnostic: String,
    },

    #[error("file listing tool {program} could not be started: {message}")]
    ToolUnavailable { program: String, message: String },

    #[error("listed path {path} could not be inspected: {message}")]
    Unreadable { path: String, message: String },
}

impl UserFacingError for ScanError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ListingFailed { .. } => Some("Make sure the project is a valid git checkout."),
            Self::ToolUnavailable { .. } => Some("Install git and make sure it is on PATH."),
            Self::Unreadable { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ListingFailed { .. } => "scan.listing_failed",
            Self::ToolUnavailable { .. } => "scan.tool_unavailable",
            Self::Unreadable { .. } => "scan.unreadable",
        };
        Some(code)
    }
}
