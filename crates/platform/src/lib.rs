#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! External collaborators for cibox
//!
//! This crate wraps everything that talks to the outside world:
//! - The container engine client (image build and run, streamed output)
//! - Version-control file listing
//! - Filesystem helpers used while staging a build context
//!
//! The orchestration layer only sees the [`ContainerEngine`] and
//! [`FileLister`] traits, so both can be replaced in tests.

pub mod docker;
pub mod engine;
pub mod fs;
pub mod process;
pub mod vcs;

pub use docker::DockerEngine;
pub use engine::{
    ContainerEngine, EngineProcess, ExitInfo, OutputChannel, OutputChunk, VolumeMount,
};
pub use process::{ChildProcess, CommandOutput, PlatformCommand};
pub use vcs::{FileLister, GitFileLister};
