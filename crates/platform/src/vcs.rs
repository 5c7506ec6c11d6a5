//! Version-control file listing

use async_trait::async_trait;
use cibox_errors::{Error, PlatformError, ScanError};
use cibox_types::ProjectFile;
use std::io::ErrorKind;
use std::path::Path;

use crate::process::PlatformCommand;

/// Lists the files a project tracks under version control
#[async_trait]
pub trait FileLister: Send + Sync {
    /// Tracked entries of `dir`, in listing order
    async fn list_tracked_files(&self, dir: &Path) -> Result<Vec<ProjectFile>, Error>;
}

/// [`FileLister`] backed by `git ls-files`
#[derive(Debug, Clone)]
pub struct GitFileLister {
    program: String,
}

impl GitFileLister {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitFileLister {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl FileLister for GitFileLister {
    async fn list_tracked_files(&self, dir: &Path) -> Result<Vec<ProjectFile>, Error> {
        let mut cmd = PlatformCommand::new(&self.program);
        // NUL separated so unusual file names are not quoted
        cmd.args(["ls-files", "-z"]).current_dir(dir);

        let output = cmd.output().await.map_err(|err| match err {
            Error::Platform(PlatformError::CommandNotFound { .. }) => {
                Error::from(ScanError::ToolUnavailable {
                    program: self.program.clone(),
                    message: "program not found".to_string(),
                })
            }
            Error::Platform(PlatformError::ProcessExecutionFailed { message, .. }) => {
                Error::from(ScanError::ToolUnavailable {
                    program: self.program.clone(),
                    message,
                })
            }
            other => other,
        })?;

        if !output.status.success() {
            return Err(ScanError::ListingFailed {
                dir: dir.display().to_string(),
                status: output.status.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut files = Vec::new();
        for relative in stdout.split('\0').filter(|entry| !entry.is_empty()) {
            let absolute = dir.join(relative);
            match tokio::fs::symlink_metadata(&absolute).await {
                Ok(metadata) => files.push(ProjectFile::new(dir, relative, metadata.is_dir())),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %absolute.display(), "skipping tracked file missing on disk");
                }
                Err(e) => {
                    return Err(ScanError::Unreadable {
                        path: absolute.display().to_string(),
                        message: e.to_string(),
                    }
                    .into())
                }
            }
        }

        tracing::debug!(dir = %dir.display(), count = files.len(), "listed tracked files");
        Ok(files)
    }
}
