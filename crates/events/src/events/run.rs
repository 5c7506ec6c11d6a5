use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Container run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// Container started with the project mounted in
    Started {
        job_id: String,
        image_tag: String,
        container: String,
        mounts: usize,
    },

    /// Container force-removed after the run was interrupted
    ContainerRemoved { job_id: String, container: String },

    /// Container exited
    Completed {
        job_id: String,
        image_tag: String,
        exit_code: Option<i32>,
        success: bool,
        duration: Duration,
    },
}
