//! Subprocess execution

use async_trait::async_trait;
use cibox_errors::{Error, PlatformError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::engine::{EngineProcess, ExitInfo, OutputChannel, OutputChunk};

const READ_BUFFER_SIZE: usize = 8192;
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Command builder for external programs
#[derive(Debug, Clone)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
            env_vars: HashMap::new(),
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child
    pub fn env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_env_vars(&self) -> &HashMap<String, String> {
        &self.env_vars
    }

    /// Program and arguments joined for messages and logs
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            command.env(key, value);
        }
        command.stdin(Stdio::null()).kill_on_drop(true);
        command
    }

    fn spawn_error(&self, err: &std::io::Error) -> Error {
        if err.kind() == ErrorKind::NotFound {
            PlatformError::CommandNotFound {
                command: self.program.clone(),
            }
            .into()
        } else {
            PlatformError::ProcessExecutionFailed {
                command: self.display(),
                message: err.to_string(),
            }
            .into()
        }
    }

    /// Run to completion, capturing both pipes
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started.
    pub async fn output(&self) -> Result<CommandOutput, Error> {
        tracing::debug!(command = %self.display(), "executing command");
        let output = self
            .to_command()
            .output()
            .await
            .map_err(|e| self.spawn_error(&e))?;

        Ok(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Start the program with both pipes streamed back as chunks
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started.
    pub fn spawn_streaming(&self) -> Result<ChildProcess, Error> {
        tracing::debug!(command = %self.display(), "spawning streamed command");
        let mut child = self
            .to_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&e))?;

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputChannel::Out, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputChannel::Err, tx);
        }

        Ok(ChildProcess {
            command: self.display(),
            child,
            chunks: rx,
        })
    }
}

/// Output from command execution
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Forward one pipe into the shared chunk channel until it closes
fn spawn_reader<R>(mut reader: R, channel: OutputChannel, tx: mpsc::Sender<OutputChunk>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(OutputChunk::new(channel, &buf[..n])).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(?channel, error = %e, "pipe read failed");
                    break;
                }
            }
        }
    });
}

/// A spawned program whose pipes are read by background tasks
pub struct ChildProcess {
    command: String,
    child: Child,
    chunks: mpsc::Receiver<OutputChunk>,
}

impl ChildProcess {
    fn wait_error(&self, err: &std::io::Error) -> Error {
        PlatformError::ProcessWaitFailed {
            command: self.command.clone(),
            message: err.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl EngineProcess for ChildProcess {
    async fn next_chunk(&mut self) -> Option<OutputChunk> {
        self.chunks.recv().await
    }

    async fn wait(&mut self) -> Result<ExitInfo, Error> {
        let status = self.child.wait().await.map_err(|e| self.wait_error(&e))?;
        tracing::debug!(command = %self.command, code = ?status.code(), "process exited");
        Ok(ExitInfo::from(status))
    }

    async fn kill(&mut self) -> Result<(), Error> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already reaped
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(self.wait_error(&e)),
        }
    }
}
