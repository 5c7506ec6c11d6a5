//! Container engine abstraction

use async_trait::async_trait;
use cibox_errors::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which pipe a chunk of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    Out,
    Err,
}

impl OutputChannel {
    #[must_use]
    pub fn is_stderr(self) -> bool {
        matches!(self, Self::Err)
    }
}

/// Raw bytes read from one of the engine's pipes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub channel: OutputChannel,
    pub data: Vec<u8>,
}

impl OutputChunk {
    pub fn new(channel: OutputChannel, data: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            data: data.into(),
        }
    }

    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OutputChannel::Out, data)
    }

    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OutputChannel::Err, data)
    }
}

/// How an engine process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ExitInfo {
    #[must_use]
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self::new(status.code())
    }
}

/// A host path mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeMount {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container)
    }
}

/// A running engine invocation with streamed output
#[async_trait]
pub trait EngineProcess: Send {
    /// Next chunk from either pipe, `None` once both pipes are closed
    async fn next_chunk(&mut self) -> Option<OutputChunk>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ExitInfo, Error>;

    /// Terminate the process
    async fn kill(&mut self) -> Result<(), Error>;
}

/// Client for a docker-compatible container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build `tag` from the descriptor; the descriptor's directory is the build context
    async fn build(&self, tag: &str, descriptor: &Path) -> Result<Box<dyn EngineProcess>, Error>;

    /// Run `image` once as container `name` with the given volumes, removing
    /// the container afterwards
    async fn run(
        &self,
        image: &str,
        name: &str,
        volumes: &[VolumeMount],
    ) -> Result<Box<dyn EngineProcess>, Error>;

    /// Stop and remove container `name`; a container that is already gone is
    /// not an error
    ///
    /// Killing the client process of a run does not stop the container
    /// itself, so interrupted runs are cleaned up through this.
    async fn remove(&self, name: &str) -> Result<(), Error>;
}
