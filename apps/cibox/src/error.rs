//! CLI error handling

use std::fmt;

use cibox_errors::UserFacingError;

/// Exit code used after an interrupt
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(cibox_errors::ConfigError),
    /// Pipeline error
    Pipeline(cibox_errors::Error),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Engine output recorded by a failed image build
    pub fn build_output(&self) -> Option<&str> {
        match self {
            CliError::Pipeline(cibox_errors::Error::Build(e)) => e.output(),
            _ => None,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Pipeline(e) if e.is_cancelled() => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Pipeline(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<cibox_errors::ConfigError> for CliError {
    fn from(e: cibox_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<cibox_errors::Error> for CliError {
    fn from(e: cibox_errors::Error) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cibox_errors::{BuildError, ConfigError, Error};

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::from(Error::Cancelled).exit_code(), EXIT_INTERRUPTED);
        assert_eq!(CliError::from(ConfigError::missing("script")).exit_code(), 1);
        let build = Error::from(BuildError::ImageBuildFailed {
            tag: "demo:v7".to_string(),
            exit_code: Some(1),
            output: String::new(),
        });
        let err = CliError::from(build);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.build_output(), Some(""));
    }

    #[test]
    fn test_pipeline_error_rendering() {
        let err = CliError::from(Error::from(ConfigError::missing("script")));
        let text = err.to_string();
        assert!(text.contains("missing required field: script"));
        assert!(text.contains("Code: config.missing_field"));
        assert!(text.contains("Hint:"));
    }
}
