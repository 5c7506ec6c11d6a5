#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Job pipeline for cibox
//!
//! This crate turns a validated [`cibox_types::Job`] into a container image
//! and runs it: it stages the project into a build context, generates the
//! build descriptor and entrypoint, follows the engine's build progress and
//! relays the container's output.

pub mod descriptor;
pub mod entrypoint;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod sink;
pub mod staging;

pub use descriptor::{render_descriptor, write_descriptor};
pub use entrypoint::{render_entrypoint, shell_quote, write_entrypoint};
pub use manifest::{default_manifest_path, load_job_spec, JobManifest, ProjectMetadata};
pub use orchestrator::{ImageBuild, Orchestrator, PipelineConfig};
pub use progress::{
    label_width_for, ClassicStepParser, LineBuffer, ProgressState, ProgressTracker, StepMarker,
    StepMarkerParser,
};
pub use sink::{NullProgress, OutputRelay, ProgressSink, StdioRelay};
pub use staging::{BuildContext, WorkspaceStager};
