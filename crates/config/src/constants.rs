//! Fixed paths and names shared by the generated build files
//!
//! These are deliberately not exposed via TOML configuration: the generated
//! descriptor, the entrypoint and the run-time volume mounts must agree on
//! them.

/// Project root inside the image and mount root at run time
pub const CONTAINER_PROJECT_ROOT: &str = "/build";

/// Where the generated entrypoint script is installed inside the image
pub const ENTRYPOINT_PATH: &str = "/usr/local/bin/cibox-entrypoint";

/// Staged project tree inside the build context
pub const STAGED_SOURCE_DIR: &str = "src";

/// Ignore-rules file read by the engine when sending the build context
pub const IGNORE_FILE: &str = ".dockerignore";

/// Paths excluded from the build context
pub const IGNORED_PATHS: &[&str] = &["src/.git", "src/vendor"];

/// Default job manifest inside the project
pub const DEFAULT_MANIFEST: &str = ".travis.yml";

/// Project metadata file used to derive the project name
pub const PROJECT_METADATA_FILE: &str = "composer.json";

/// Subdirectory of the temp root receiving debug logs
pub const LOGS_SUBDIR: &str = "logs";
