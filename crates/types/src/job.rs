//! Job model and validation
//!
//! A [`JobSpec`] holds raw, unchecked inputs. [`Job::validate`] turns it into
//! an immutable [`Job`] or fails with a [`ConfigError`] naming the offending
//! field. Validation only reads filesystem metadata.

use crate::project::sanitize_project_name;
use cibox_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Longest id that still fits Docker's 128 character tag limit after the `v` prefix
const MAX_ID_LEN: usize = 127;

/// Opaque, tag-safe identifier of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse a caller-supplied id
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty, too long, or contains characters
    /// that are not valid in an image tag.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && !raw.starts_with(['.', '-'])
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ConfigError::invalid_value("id", raw).into())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A single environment declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `NAME=value` assignment
    ///
    /// # Errors
    ///
    /// Returns an error if there is no `=` in the assignment.
    pub fn parse_assignment(raw: &str) -> Result<Self, Error> {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid_value("env", raw))?;
        Ok(Self::new(name.trim(), value))
    }
}

/// The four ordered script phases of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPhases {
    pub before_install: Vec<String>,
    pub install: Vec<String>,
    pub before: Vec<String>,
    pub run: Vec<String>,
}

impl ScriptPhases {
    /// Commands baked into the image, in execution order
    pub fn image_commands(&self) -> impl Iterator<Item = &str> {
        self.before_install
            .iter()
            .chain(&self.install)
            .chain(&self.before)
            .map(String::as_str)
    }
}

/// Unvalidated job inputs
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub project_dir: PathBuf,
    /// Name from project metadata; the directory name is used when absent
    pub project_name: Option<String>,
    pub runtime_version: Option<String>,
    pub env: Vec<EnvVar>,
    pub phases: ScriptPhases,
    /// Fixed id; a random one is generated when absent
    pub id: Option<String>,
}

/// A validated build+run request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    id: JobId,
    project_dir: PathBuf,
    project_name: String,
    runtime_version: String,
    env: Vec<EnvVar>,
    phases: ScriptPhases,
}

impl Job {
    /// Validate raw inputs into a job
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the runtime version is missing, the `run`
    /// phase is empty, the project directory is missing or not a git checkout,
    /// the project name or id is unusable, the runtime version is not
    /// tag-safe, an environment name is malformed, or an environment value or
    /// image-phase command spans several lines.
    pub fn validate(spec: JobSpec) -> Result<Self, Error> {
        let runtime_version = spec
            .runtime_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::missing("runtime_version"))?;

        if spec.phases.run.iter().all(|cmd| cmd.trim().is_empty()) {
            return Err(ConfigError::missing("script").into());
        }

        if !runtime_version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::invalid_value("runtime_version", runtime_version).into());
        }

        if let Some(cmd) = spec.phases.image_commands().find(|cmd| spans_lines(cmd)) {
            return Err(ConfigError::Invalid {
                message: format!("image phase command spans several lines: {cmd:?}"),
            }
            .into());
        }

        for var in &spec.env {
            if var.name.is_empty() || var.name.contains(|c: char| c.is_whitespace() || c == '=') {
                return Err(ConfigError::invalid_value("env", &var.name).into());
            }
            if spans_lines(&var.value) {
                return Err(ConfigError::invalid_value(
                    format!("env.{}", var.name),
                    var.value.escape_debug().to_string(),
                )
                .into());
            }
        }

        let project_dir = resolve_project_dir(&spec.project_dir)?;

        let raw_name = match spec.project_name {
            Some(name) => name,
            None => project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let project_name = sanitize_project_name(&raw_name);
        if project_name.is_empty() {
            return Err(ConfigError::invalid_value("project_name", raw_name).into());
        }

        let id = match spec.id {
            Some(raw) => JobId::parse(&raw)?,
            None => JobId::generate(),
        };

        Ok(Self {
            id,
            project_dir,
            project_name,
            runtime_version,
            env: spec.env,
            phases: spec.phases,
        })
    }

    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    #[must_use]
    pub fn env(&self) -> &[EnvVar] {
        &self.env
    }

    #[must_use]
    pub fn phases(&self) -> &ScriptPhases {
        &self.phases
    }

    /// Image reference for this job: `<project_name>:v<id>`
    #[must_use]
    pub fn image_tag(&self) -> String {
        format!("{}:v{}", self.project_name.to_lowercase(), self.id)
    }

    /// Name given to the job's container so it can be removed when interrupted
    #[must_use]
    pub fn container_name(&self) -> String {
        format!("cibox-{}-{}", self.project_name, self.id)
    }

    /// File name of the generated build descriptor
    #[must_use]
    pub fn descriptor_filename(&self) -> String {
        format!("Dockerfile.{}", self.id)
    }

    /// File name of the generated entrypoint script
    #[must_use]
    pub fn entrypoint_filename(&self) -> String {
        format!("entrypoint-{}.sh", self.id)
    }
}

/// Whether `text` would not stay a single descriptor instruction
fn spans_lines(text: &str) -> bool {
    text.contains(['\n', '\r']) || text.trim_end().ends_with('\\')
}

fn resolve_project_dir(dir: &Path) -> Result<PathBuf, Error> {
    let missing = || ConfigError::ProjectNotFound {
        path: dir.display().to_string(),
    };

    let resolved = std::fs::canonicalize(dir).map_err(|_| missing())?;
    if !resolved.is_dir() {
        return Err(missing().into());
    }

    // `.git` is a directory in a normal checkout and a file in worktrees
    if !resolved.join(".git").exists() {
        return Err(ConfigError::NotVersionControlled {
            path: resolved.display().to_string(),
        }
        .into());
    }

    Ok(resolved)
}
