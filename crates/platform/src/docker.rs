//! Docker-compatible command-line engine client

use async_trait::async_trait;
use cibox_errors::{Error, PlatformError};
use std::path::Path;

use crate::engine::{ContainerEngine, EngineProcess, VolumeMount};
use crate::process::PlatformCommand;

/// Engine client driving `docker` (or a compatible CLI such as `podman`)
#[derive(Debug, Clone)]
pub struct DockerEngine {
    program: String,
}

impl DockerEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line for an image build
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor has no parent directory.
    pub fn build_command(&self, tag: &str, descriptor: &Path) -> Result<PlatformCommand, Error> {
        let context_dir = descriptor.parent().ok_or_else(|| {
            Error::internal(format!(
                "descriptor {} has no parent directory",
                descriptor.display()
            ))
        })?;

        let mut cmd = PlatformCommand::new(&self.program);
        cmd.arg("build")
            .args(["-t", tag])
            .arg("-f")
            .arg(descriptor.to_string_lossy())
            .arg(context_dir.to_string_lossy())
            // Classic builder output carries `Step N/M :` markers
            .env("DOCKER_BUILDKIT", "0");
        Ok(cmd)
    }

    /// Command line for a one-shot container run
    #[must_use]
    pub fn run_command(
        &self,
        image: &str,
        name: &str,
        volumes: &[VolumeMount],
    ) -> PlatformCommand {
        let mut cmd = PlatformCommand::new(&self.program);
        cmd.args(["run", "--rm", "--name", name]);
        for volume in volumes {
            cmd.arg("-v").arg(volume.to_string());
        }
        cmd.arg(image);
        cmd
    }

    /// Command line force-removing a container
    #[must_use]
    pub fn remove_command(&self, name: &str) -> PlatformCommand {
        let mut cmd = PlatformCommand::new(&self.program);
        cmd.args(["rm", "-f", name]);
        cmd
    }
}

impl Default for DockerEngine {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build(&self, tag: &str, descriptor: &Path) -> Result<Box<dyn EngineProcess>, Error> {
        let process = self.build_command(tag, descriptor)?.spawn_streaming()?;
        Ok(Box::new(process))
    }

    async fn run(
        &self,
        image: &str,
        name: &str,
        volumes: &[VolumeMount],
    ) -> Result<Box<dyn EngineProcess>, Error> {
        let process = self.run_command(image, name, volumes).spawn_streaming()?;
        Ok(Box::new(process))
    }

    async fn remove(&self, name: &str) -> Result<(), Error> {
        let cmd = self.remove_command(name);
        let output = cmd.output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_container(&stderr) {
            tracing::debug!(container = name, "container already removed");
            return Ok(());
        }
        Err(PlatformError::ProcessExecutionFailed {
            command: cmd.display(),
            message: stderr.trim().to_string(),
        }
        .into())
    }
}

fn is_missing_container(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such container") || stderr.contains("no container with name")
}
