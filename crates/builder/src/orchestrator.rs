//! Build-then-run pipeline

use cibox_config::{fixed_paths, Config};
use cibox_errors::{BuildError, Error, UserFacingError};
use cibox_events::{AppEvent, BuildEvent, EventEmitter, EventSender, FailureContext, RunEvent};
use cibox_platform::{ContainerEngine, EngineProcess, FileLister, OutputChunk, VolumeMount};
use cibox_types::{Job, PipelineReport, RunOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::descriptor::write_descriptor;
use crate::entrypoint::write_entrypoint;
use crate::progress::{
    label_width_for, ClassicStepParser, LineBuffer, ProgressTracker, StepMarkerParser,
};
use crate::sink::{NullProgress, OutputRelay, ProgressSink, StdioRelay};
use crate::staging::{BuildContext, WorkspaceStager};

/// Terminal width assumed when none is known
const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Settings for one orchestrator
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of all build contexts
    pub temp_root: PathBuf,
    /// Repository of the base image, tagged with the runtime version
    pub base_image: String,
    /// Relay raw build output
    pub show_output: bool,
    /// Maximum characters of the progress label
    pub label_width: usize,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_root: config.temp_root(),
            base_image: config.build.base_image.clone(),
            show_output: config.build.show_output,
            label_width: label_width_for(DEFAULT_TERMINAL_WIDTH),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A successfully built image
#[derive(Debug, Clone)]
pub struct ImageBuild {
    pub tag: String,
    pub context: BuildContext,
    pub total_steps: usize,
    pub duration: Duration,
}

/// Drives staging, image build and container run for a job
pub struct Orchestrator {
    engine: Arc<dyn ContainerEngine>,
    stager: WorkspaceStager,
    progress: Arc<dyn ProgressSink>,
    relay: Arc<dyn OutputRelay>,
    parser: Arc<dyn StepMarkerParser>,
    event_sender: Option<EventSender>,
    cancel: Option<watch::Receiver<bool>>,
    config: PipelineConfig,
}

impl EventEmitter for Orchestrator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

enum Next {
    Chunk(Option<OutputChunk>),
    Cancelled,
}

impl Orchestrator {
    /// Create an orchestrator with silent progress and stdio relay
    ///
    /// # Errors
    ///
    /// Returns an error if the default step marker parser cannot be built.
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lister: Arc<dyn FileLister>,
        config: PipelineConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            engine,
            stager: WorkspaceStager::new(lister, config.temp_root.clone()),
            progress: Arc::new(NullProgress),
            relay: Arc::new(StdioRelay),
            parser: Arc::new(ClassicStepParser::new()?),
            event_sender: None,
            cancel: None,
            config,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_relay(mut self, relay: Arc<dyn OutputRelay>) -> Self {
        self.relay = relay;
        self
    }

    #[must_use]
    pub fn with_step_parser(mut self, parser: Arc<dyn StepMarkerParser>) -> Self {
        self.parser = parser;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.stager = self.stager.with_event_sender(sender.clone());
        self.event_sender = Some(sender);
        self
    }

    /// Abort streams once the watched value becomes `true`
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn stager(&self) -> &WorkspaceStager {
        &self.stager
    }

    /// Stage the job, generate its build files and build the image
    ///
    /// # Errors
    ///
    /// Returns `BuildError::ImageBuildFailed` if the engine exits non-zero,
    /// `Error::Cancelled` on cancellation, or the staging/platform error that
    /// stopped the build.
    pub async fn build_image(&self, job: &Job) -> Result<ImageBuild, Error> {
        let started = Instant::now();
        let job_id = job.id().to_string();
        let tag = job.image_tag();

        let context = self.stager.stage(job).await?;
        write_entrypoint(&context, job).await?;
        let lines = write_descriptor(&context, job, &self.config.base_image).await?;
        let total_steps = lines.len();

        self.emit(AppEvent::Build(BuildEvent::DescriptorRendered {
            job_id: job_id.clone(),
            descriptor: context.descriptor_path(),
            total_steps,
        }));

        let mut tracker = ProgressTracker::new(lines, self.config.label_width, self.parser.clone());
        let mut buffer = LineBuffer::new();
        let mut output = String::new();

        self.emit(AppEvent::Build(BuildEvent::Started {
            job_id: job_id.clone(),
            image_tag: tag.clone(),
            total_steps,
        }));
        let mut process = self.engine.build(&tag, &context.descriptor_path()).await?;

        let mut cancel = self.cancel.clone();
        loop {
            let chunk = match next_or_cancel(process.as_mut(), &mut cancel).await {
                Next::Chunk(Some(chunk)) => chunk,
                Next::Chunk(None) => break,
                Next::Cancelled => return Err(self.cancel_process(process.as_mut()).await),
            };

            output.push_str(&String::from_utf8_lossy(&chunk.data));
            if self.config.show_output {
                self.relay.relay(&chunk)?;
            }
            for line in buffer.push(chunk.channel, &chunk.data) {
                self.observe_build_line(&job_id, &mut tracker, line, chunk.channel.is_stderr());
            }
        }
        for (channel, line) in buffer.finish() {
            self.observe_build_line(&job_id, &mut tracker, line, channel.is_stderr());
        }

        let exit = process.wait().await?;
        if !exit.success() {
            self.progress.abandon();
            let err = BuildError::ImageBuildFailed {
                tag: tag.clone(),
                exit_code: exit.code,
                output,
            };
            self.emit(AppEvent::Build(BuildEvent::Failed {
                job_id,
                image_tag: tag,
                exit_code: exit.code,
                failure: FailureContext::from_error(&err),
            }));
            return Err(err.into());
        }

        self.progress.finish(total_steps);
        let duration = started.elapsed();
        self.emit(AppEvent::Build(BuildEvent::Completed {
            job_id,
            image_tag: tag.clone(),
            duration,
        }));

        Ok(ImageBuild {
            tag,
            context,
            total_steps,
            duration,
        })
    }

    fn observe_build_line(
        &self,
        job_id: &str,
        tracker: &mut ProgressTracker,
        line: String,
        is_stderr: bool,
    ) {
        if let Some(state) = tracker.observe_line(&line) {
            self.progress
                .update(state.current_step, state.total_steps, &state.current_label);
            self.emit(AppEvent::Build(BuildEvent::StepProgress {
                job_id: job_id.to_string(),
                current_step: state.current_step,
                total_steps: state.total_steps,
                instruction: state.current_label.clone(),
            }));
        }
        self.emit(AppEvent::Build(BuildEvent::StepOutput {
            job_id: job_id.to_string(),
            line,
            is_stderr,
        }));
    }

    /// Run the image once with the project's tracked files mounted in
    ///
    /// A non-zero container exit is reported in the outcome, not as an error.
    /// When cancelled, the container itself is force-removed as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be listed, the engine cannot be
    /// started, output cannot be relayed, or the run is cancelled.
    pub async fn run_image(&self, job: &Job, tag: &str) -> Result<RunOutcome, Error> {
        let started = Instant::now();
        let files = self.stager.list_project_files(job.project_dir()).await?;
        let volumes: Vec<VolumeMount> = files
            .iter()
            .map(|file| {
                VolumeMount::new(
                    file.absolute.clone(),
                    file.container_path(fixed_paths::CONTAINER_PROJECT_ROOT),
                )
            })
            .collect();

        let container = job.container_name();
        self.emit(AppEvent::Run(RunEvent::Started {
            job_id: job.id().to_string(),
            image_tag: tag.to_string(),
            container: container.clone(),
            mounts: volumes.len(),
        }));
        let mut process = self.engine.run(tag, &container, &volumes).await?;

        let mut cancel = self.cancel.clone();
        loop {
            match next_or_cancel(process.as_mut(), &mut cancel).await {
                Next::Chunk(Some(chunk)) => self.relay.relay(&chunk)?,
                Next::Chunk(None) => break,
                Next::Cancelled => {
                    let err = self.cancel_process(process.as_mut()).await;
                    self.remove_container(job, &container).await;
                    return Err(err);
                }
            }
        }

        let exit = process.wait().await?;
        let outcome = RunOutcome::new(exit.code);
        self.emit(AppEvent::Run(RunEvent::Completed {
            job_id: job.id().to_string(),
            image_tag: tag.to_string(),
            exit_code: exit.code,
            success: outcome.success(),
            duration: started.elapsed(),
        }));
        Ok(outcome)
    }

    /// Build the image, then run it
    ///
    /// The run phase is never attempted after a failed build.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of either phase.
    pub async fn execute(&self, job: &Job) -> Result<PipelineReport, Error> {
        let operation = format!("pipeline {}", job.image_tag());
        self.emit_operation_started(&operation);

        let build = match self.build_image(job).await {
            Ok(build) => build,
            Err(err) => {
                if !err.is_cancelled() {
                    self.progress
                        .banner(&format!("Image build failed: {}", job.image_tag()), false);
                }
                self.emit_operation_failed(&operation, FailureContext::from_error(&err));
                return Err(err);
            }
        };
        self.progress.banner(
            &format!("Image {} built in {:.1}s", build.tag, build.duration.as_secs_f64()),
            true,
        );

        let run = match self.run_image(job, &build.tag).await {
            Ok(run) => run,
            Err(err) => {
                self.emit_operation_failed(&operation, FailureContext::from_error(&err));
                return Err(err);
            }
        };
        if run.success() {
            self.progress.banner("Job succeeded", true);
        } else {
            let code = run
                .exit_code
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            self.progress
                .banner(&format!("Job failed (exit {code})"), false);
        }
        self.emit_operation_completed(&operation, run.success());

        Ok(PipelineReport {
            job_id: job.id().to_string(),
            image_tag: build.tag,
            total_steps: build.total_steps,
            build_duration_ms: u64::try_from(build.duration.as_millis()).unwrap_or(u64::MAX),
            run,
        })
    }

    async fn cancel_process(&self, process: &mut dyn EngineProcess) -> Error {
        if let Err(err) = process.kill().await {
            self.emit_warning(
                "failed to stop engine process",
                Some(err.user_message().into_owned()),
            );
        }
        self.progress.abandon();
        Error::Cancelled
    }

    /// Force-remove an interrupted run's container
    async fn remove_container(&self, job: &Job, container: &str) {
        match self.engine.remove(container).await {
            Ok(()) => self.emit(AppEvent::Run(RunEvent::ContainerRemoved {
                job_id: job.id().to_string(),
                container: container.to_string(),
            })),
            Err(err) => self.emit_warning(
                format!("failed to remove container {container}"),
                Some(err.user_message().into_owned()),
            ),
        }
    }
}

async fn next_or_cancel(
    process: &mut dyn EngineProcess,
    cancel: &mut Option<watch::Receiver<bool>>,
) -> Next {
    tokio::select! {
        chunk = process.next_chunk() => Next::Chunk(chunk),
        () = cancelled(cancel) => Next::Cancelled,
    }
}

/// Resolves once cancellation is requested; never if it cannot be
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        if rx.wait_for(|requested| *requested).await.map(|_| ()).is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await;
}
