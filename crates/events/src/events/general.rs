use serde::{Deserialize, Serialize};

/// Pipeline-wide notices that are not tied to one phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something went wrong without stopping the pipeline
    Warning {
        message: String,
        /// Underlying cause, e.g. the engine's error text
        context: Option<String>,
    },

    /// A pipeline run began
    OperationStarted { operation: String },

    /// A pipeline run ended; `success` reflects the job's own result
    OperationCompleted { operation: String, success: bool },

    /// A pipeline run was aborted by a fatal error
    OperationFailed {
        operation: String,
        failure: super::FailureContext,
    },
}

impl GeneralEvent {
    pub fn warning(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context,
        }
    }
}
