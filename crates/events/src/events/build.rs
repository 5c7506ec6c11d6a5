use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Image build events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// Project files mirrored into the build context
    WorkspaceStaged {
        job_id: String,
        context_dir: PathBuf,
        files: usize,
    },

    /// Descriptor and entrypoint written
    DescriptorRendered {
        job_id: String,
        descriptor: PathBuf,
        total_steps: usize,
    },

    /// Engine build started
    Started {
        job_id: String,
        image_tag: String,
        total_steps: usize,
    },

    /// A step marker was recognized in the engine output
    StepProgress {
        job_id: String,
        current_step: usize,
        total_steps: usize,
        instruction: String,
    },

    /// Raw engine output line
    StepOutput {
        job_id: String,
        line: String,
        is_stderr: bool,
    },

    /// Image built successfully
    Completed {
        job_id: String,
        image_tag: String,
        duration: Duration,
    },

    /// Image build failed
    Failed {
        job_id: String,
        image_tag: String,
        exit_code: Option<i32>,
        failure: super::FailureContext,
    },
}
