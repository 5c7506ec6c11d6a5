//! Build context staging
//!
//! Mirrors the tracked files of a project into
//! `<temp_root>/<project_name>/src` so the engine receives a clean build
//! context without untracked artifacts.

use cibox_config::fixed_paths;
use cibox_errors::Error;
use cibox_events::{AppEvent, BuildEvent, EventEmitter, EventSender};
use cibox_platform::{fs, FileLister};
use cibox_types::{Job, ProjectFile, LOCKFILE_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Staging directory of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    root: PathBuf,
    descriptor_filename: String,
    entrypoint_filename: String,
    staged_files: usize,
}

impl BuildContext {
    /// Context location for `job` under `temp_root`, nothing is created
    #[must_use]
    pub fn for_job(temp_root: &Path, job: &Job) -> Self {
        Self {
            root: temp_root.join(job.project_name()),
            descriptor_filename: job.descriptor_filename(),
            entrypoint_filename: job.entrypoint_filename(),
            staged_files: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirrored project tree
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(fixed_paths::STAGED_SOURCE_DIR)
    }

    #[must_use]
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(&self.descriptor_filename)
    }

    #[must_use]
    pub fn entrypoint_filename(&self) -> &str {
        &self.entrypoint_filename
    }

    #[must_use]
    pub fn entrypoint_path(&self) -> PathBuf {
        self.root.join(&self.entrypoint_filename)
    }

    #[must_use]
    pub fn ignore_file_path(&self) -> PathBuf {
        self.root.join(fixed_paths::IGNORE_FILE)
    }

    /// Number of listed entries copied by the last staging run
    #[must_use]
    pub fn staged_files(&self) -> usize {
        self.staged_files
    }
}

/// Copies a project's tracked files into its build context
#[derive(Clone)]
pub struct WorkspaceStager {
    lister: Arc<dyn FileLister>,
    temp_root: PathBuf,
    event_sender: Option<EventSender>,
}

impl EventEmitter for WorkspaceStager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl WorkspaceStager {
    pub fn new(lister: Arc<dyn FileLister>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            lister,
            temp_root: temp_root.into(),
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Tracked files of the project plus the dependency lockfile
    ///
    /// # Errors
    ///
    /// Returns a `ScanError` if the files cannot be listed.
    pub async fn list_project_files(&self, project_dir: &Path) -> Result<Vec<ProjectFile>, Error> {
        let mut files = self.lister.list_tracked_files(project_dir).await?;

        let lockfile = project_dir.join(LOCKFILE_NAME);
        let already_listed = files
            .iter()
            .any(|f| f.relative.as_path() == Path::new(LOCKFILE_NAME));
        if !already_listed && tokio::fs::try_exists(&lockfile).await.unwrap_or(false) {
            files.push(ProjectFile::new(project_dir, LOCKFILE_NAME, false));
        }

        Ok(files)
    }

    /// Mirror the project into a fresh `src/` and write the ignore file
    ///
    /// Any previous `src/` is removed first, so stale files never survive.
    ///
    /// # Errors
    ///
    /// Returns a `ScanError` if listing fails or a `StagingError` if any
    /// filesystem operation fails.
    pub async fn stage(&self, job: &Job) -> Result<BuildContext, Error> {
        let mut context = BuildContext::for_job(&self.temp_root, job);
        let files = self.list_project_files(job.project_dir()).await?;

        fs::create_dir_all(context.root()).await?;
        let source_dir = context.source_dir();
        fs::remove_dir_if_exists(&source_dir).await?;
        fs::create_dir_all(&source_dir).await?;

        for file in &files {
            let target = source_dir.join(&file.relative);
            if file.is_dir {
                fs::copy_directory(&file.absolute, &target).await?;
            } else {
                fs::copy_entry(&file.absolute, &target).await?;
            }
        }

        let mut ignore = fixed_paths::IGNORED_PATHS.join("\n");
        ignore.push('\n');
        fs::write_file(&context.ignore_file_path(), &ignore).await?;

        context.staged_files = files.len();
        tracing::debug!(
            context = %context.root().display(),
            files = files.len(),
            "staged build context"
        );
        self.emit(AppEvent::Build(BuildEvent::WorkspaceStaged {
            job_id: job.id().to_string(),
            context_dir: context.root().to_path_buf(),
            files: files.len(),
        }));

        Ok(context)
    }
}
