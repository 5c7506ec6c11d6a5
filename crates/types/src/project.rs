//! Project file entries and naming rules

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Dependency lockfile that is staged even when it is not tracked
pub const LOCKFILE_NAME: &str = "composer.lock";

/// One entry of a project's file listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Absolute path on the host
    pub absolute: PathBuf,
    /// Path relative to the project root
    pub relative: PathBuf,
    /// Whether the entry is a directory (e.g. a git submodule)
    pub is_dir: bool,
}

impl ProjectFile {
    /// Create an entry rooted at `project_dir`
    #[must_use]
    pub fn new(project_dir: &Path, relative: impl Into<PathBuf>, is_dir: bool) -> Self {
        let relative = relative.into();
        Self {
            absolute: project_dir.join(&relative),
            relative,
            is_dir,
        }
    }

    /// Path of this entry inside a container whose project root is `root`
    ///
    /// Always uses forward slashes regardless of the host platform.
    #[must_use]
    pub fn container_path(&self, root: &str) -> String {
        let parts: Vec<String> = self
            .relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        format!("{}/{}", root.trim_end_matches('/'), parts.join("/"))
    }
}

/// Turn arbitrary project metadata into a name usable for paths and image tags
///
/// The result is a valid image repository component: lowercase alphanumeric
/// runs joined by single separators. A lone `.`, `_` or `-` between two
/// alphanumerics is kept; any other run of non-alphanumeric characters becomes
/// one `-`. Leading and trailing separators are dropped, so the result may be
/// empty.
#[must_use]
pub fn sanitize_project_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut separators = String::new();

    for c in raw.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if !name.is_empty() {
                match separators.as_str() {
                    "" => {}
                    "." | "_" | "-" => name.push_str(&separators),
                    _ => name.push('-'),
                }
            }
            separators.clear();
            name.push(c);
        } else {
            separators.push(c);
        }
    }

    name
}
