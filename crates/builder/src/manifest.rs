//! Job manifest loading
//!
//! A job is described by a `.travis.yml`-style YAML file in the project and
//! the project's `composer.json`. Both are combined into a [`JobSpec`] that
//! still has to go through [`cibox_types::Job::validate`].

use cibox_config::fixed_paths;
use cibox_errors::{ConfigError, Error};
use cibox_types::{EnvVar, JobSpec, ScriptPhases};
use serde::{Deserialize, Deserializer};
use serde_yml::Value;
use std::path::{Path, PathBuf};

/// Parsed job manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobManifest {
    /// Runtime version: a string, a number or a list (first entry wins)
    #[serde(default)]
    pub php: Option<Value>,

    /// `NAME=value` list, mapping, or `{ global: [...] }`
    #[serde(default)]
    pub env: Option<Value>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub before_install: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub install: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub before_script: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub script: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(cmd)) => vec![cmd],
        Some(OneOrMany::Many(cmds)) => cmds,
    })
}

impl JobManifest {
    /// Parse manifest YAML; `origin` is only used in error messages
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ParseError` if the YAML is malformed or a key
    /// has an unsupported shape.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, Error> {
        // An empty document deserializes as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                path: origin.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load and parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;
        Self::parse(&content, path)
    }

    /// First declared runtime version
    ///
    /// # Errors
    ///
    /// Returns an error if `php` is neither a scalar nor a list of scalars.
    pub fn runtime_version(&self) -> Result<Option<String>, Error> {
        match &self.php {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Sequence(items)) => match items.first() {
                None => Ok(None),
                Some(first) => scalar_to_string(first)
                    .map(Some)
                    .ok_or_else(|| ConfigError::invalid_value("php", format!("{first:?}")).into()),
            },
            Some(other) => scalar_to_string(other)
                .map(Some)
                .ok_or_else(|| ConfigError::invalid_value("php", format!("{other:?}")).into()),
        }
    }

    /// Environment declarations in order
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is not a `NAME=value` assignment.
    pub fn env_vars(&self) -> Result<Vec<EnvVar>, Error> {
        let mut vars = Vec::new();
        if let Some(env) = &self.env {
            collect_env(env, &mut vars)?;
        }
        Ok(vars)
    }

    /// Script phases in execution order
    #[must_use]
    pub fn phases(&self) -> ScriptPhases {
        ScriptPhases {
            before_install: self.before_install.clone(),
            install: self.install.clone(),
            before: self.before_script.clone(),
            run: self.script.clone(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collect_env(value: &Value, vars: &mut Vec<EnvVar>) -> Result<(), Error> {
    match value {
        Value::Null => {}
        Value::String(assignment) => vars.push(EnvVar::parse_assignment(assignment)?),
        Value::Sequence(items) => {
            for item in items {
                match item {
                    Value::String(assignment) => vars.push(EnvVar::parse_assignment(assignment)?),
                    // Encrypted entries cannot be used locally
                    Value::Mapping(map) if map.contains_key("secure") => {
                        tracing::debug!("skipping encrypted env entry");
                    }
                    other => {
                        return Err(ConfigError::invalid_value("env", format!("{other:?}")).into())
                    }
                }
            }
        }
        Value::Mapping(map) => {
            if let Some(global) = map.get("global") {
                return collect_env(global, vars);
            }
            for (name, value) in map {
                let name = scalar_to_string(name)
                    .ok_or_else(|| ConfigError::invalid_value("env", format!("{name:?}")))?;
                let value = scalar_to_string(value).unwrap_or_default();
                vars.push(EnvVar::new(name, value));
            }
        }
        other => return Err(ConfigError::invalid_value("env", format!("{other:?}")).into()),
    }
    Ok(())
}

/// Project metadata read from `composer.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

impl ProjectMetadata {
    /// Read metadata from `dir`, falling back to the directory name
    ///
    /// # Errors
    ///
    /// Returns an error if `composer.json` exists but is not valid JSON.
    pub async fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(fixed_paths::PROJECT_METADATA_FILE);
        let mut metadata = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<Self>(&content).map_err(|e| {
                ConfigError::ParseError {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(Error::io_with_path(&e, path)),
        };

        if metadata.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            metadata.name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        Ok(metadata)
    }
}

/// Default manifest location for a project
#[must_use]
pub fn default_manifest_path(project_dir: &Path) -> PathBuf {
    project_dir.join(fixed_paths::DEFAULT_MANIFEST)
}

/// Combine manifest and project metadata into raw job inputs
///
/// # Errors
///
/// Returns a `ConfigError` if the manifest or metadata cannot be read or parsed.
pub async fn load_job_spec(
    project_dir: &Path,
    manifest_path: Option<&Path>,
) -> Result<JobSpec, Error> {
    let manifest_path =
        manifest_path.map_or_else(|| default_manifest_path(project_dir), Path::to_path_buf);
    let manifest = JobManifest::load(&manifest_path).await?;
    let metadata = ProjectMetadata::load(project_dir).await?;

    tracing::debug!(
        manifest = %manifest_path.display(),
        project = ?metadata.name,
        "loaded job manifest"
    );

    Ok(JobSpec {
        project_dir: project_dir.to_path_buf(),
        project_name: metadata.name,
        runtime_version: manifest.runtime_version()?,
        env: manifest.env_vars()?,
        phases: manifest.phases(),
        id: None,
    })
}
