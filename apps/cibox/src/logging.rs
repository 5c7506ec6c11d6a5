//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields so the
//! JSON debug log carries the full history of a run.

use cibox_events::{AppEvent, BuildEvent, GeneralEvent, RunEvent};
use tracing::{debug, error, info, trace, warn};

/// Log an `AppEvent` at its level with structured fields
pub fn log_event_with_tracing(event: &AppEvent) {
    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(target: "cibox::events::general", context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(target: "cibox::events::general", operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(
                    target: "cibox::events::general",
                    operation = %operation,
                    success = success,
                    "Operation completed"
                );
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                error!(
                    target: "cibox::events::general",
                    operation = %operation,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Operation failed"
                );
            }
        },

        AppEvent::Build(build) => match build {
            BuildEvent::WorkspaceStaged {
                job_id,
                context_dir,
                files,
            } => {
                info!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    context_dir = %context_dir.display(),
                    files = files,
                    "Workspace staged"
                );
            }
            BuildEvent::DescriptorRendered {
                job_id,
                descriptor,
                total_steps,
            } => {
                debug!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    descriptor = %descriptor.display(),
                    total_steps = total_steps,
                    "Build descriptor written"
                );
            }
            BuildEvent::Started {
                job_id,
                image_tag,
                total_steps,
            } => {
                info!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    image_tag = %image_tag,
                    total_steps = total_steps,
                    "Image build started"
                );
            }
            BuildEvent::StepProgress {
                job_id,
                current_step,
                total_steps,
                instruction,
            } => {
                debug!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    current_step = current_step,
                    total_steps = total_steps,
                    instruction = %instruction,
                    "Build step"
                );
            }
            BuildEvent::StepOutput {
                job_id,
                line,
                is_stderr,
            } => {
                trace!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    is_stderr = is_stderr,
                    "{line}"
                );
            }
            BuildEvent::Completed {
                job_id,
                image_tag,
                duration,
            } => {
                info!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    image_tag = %image_tag,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Image build completed"
                );
            }
            BuildEvent::Failed {
                job_id,
                image_tag,
                exit_code,
                failure,
            } => {
                error!(
                    target: "cibox::events::build",
                    job_id = %job_id,
                    image_tag = %image_tag,
                    exit_code = ?exit_code,
                    code = ?failure.code,
                    message = %failure.message,
                    "Image build failed"
                );
            }
        },

        AppEvent::Run(run) => match run {
            RunEvent::Started {
                job_id,
                image_tag,
                container,
                mounts,
            } => {
                info!(
                    target: "cibox::events::run",
                    job_id = %job_id,
                    image_tag = %image_tag,
                    container = %container,
                    mounts = mounts,
                    "Container started"
                );
            }
            RunEvent::ContainerRemoved { job_id, container } => {
                info!(
                    target: "cibox::events::run",
                    job_id = %job_id,
                    container = %container,
                    "Interrupted container removed"
                );
            }
            RunEvent::Completed {
                job_id,
                image_tag,
                exit_code,
                success,
                duration,
            } => {
                if *success {
                    info!(
                        target: "cibox::events::run",
                        job_id = %job_id,
                        image_tag = %image_tag,
                        exit_code = ?exit_code,
                        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                        "Container exited"
                    );
                } else {
                    warn!(
                        target: "cibox::events::run",
                        job_id = %job_id,
                        image_tag = %image_tag,
                        exit_code = ?exit_code,
                        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                        "Container exited with failure"
                    );
                }
            }
        },
    }
}
