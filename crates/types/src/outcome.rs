//! Results reported back to the caller

use serde::{Deserialize, Serialize};

/// Result of running the job's image
///
/// A failed run is an expected outcome (the job's own script failed), so it
/// is reported here rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Exit code of the container, `None` when terminated by a signal
    pub exit_code: Option<i32>,
}

impl RunOutcome {
    #[must_use]
    pub fn new(exit_code: Option<i32>) -> Self {
        Self { exit_code }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Process exit code the CLI should use for this outcome
    #[must_use]
    pub fn process_exit_code(&self) -> i32 {
        match self.exit_code {
            Some(0) => 0,
            Some(code) if code > 0 && code < 256 => code,
            _ => 1,
        }
    }
}

/// Summary of a complete build+run pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub job_id: String,
    pub image_tag: String,
    pub total_steps: usize,
    pub build_duration_ms: u64,
    pub run: RunOutcome,
}
