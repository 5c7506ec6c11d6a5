#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for cibox
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/cibox/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;
pub use constants as fixed_paths;

use cibox_errors::{ConfigError, Error};
use cibox_types::ColorChoice;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

/// Image build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Relay raw engine output while building
    #[serde(default)]
    pub show_output: bool,
    /// Base image repository, tagged with the job's runtime version
    #[serde(default = "default_base_image")]
    pub base_image: String,
}

/// External programs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Container engine CLI (docker-compatible)
    #[serde(default = "default_engine_program")]
    pub program: String,
    /// Version-control CLI used to list project files
    #[serde(default = "default_vcs_program")]
    pub vcs_program: String,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub temp_root: Option<PathBuf>,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: ColorChoice::Auto,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            show_output: false,
            base_image: default_base_image(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            vcs_program: default_vcs_program(),
        }
    }
}

// Default value functions for serde
fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_base_image() -> String {
    "travisci/php".to_string()
}

fn default_engine_program() -> String {
    "docker".to_string()
}

fn default_vcs_program() -> String {
    "git".to_string()
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("cibox").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    /// Merge overrides from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns an error for values that cannot be parsed.
    pub fn merge_vars<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // CIBOX_COLOR
        if let Some(color) = lookup("CIBOX_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(ConfigError::invalid_value("CIBOX_COLOR", color).into()),
            };
        }

        // CIBOX_ENGINE
        if let Some(program) = lookup("CIBOX_ENGINE") {
            if program.trim().is_empty() {
                return Err(ConfigError::invalid_value("CIBOX_ENGINE", program).into());
            }
            self.engine.program = program;
        }

        // CIBOX_BASE_IMAGE
        if let Some(image) = lookup("CIBOX_BASE_IMAGE") {
            if image.trim().is_empty() || image.contains(char::is_whitespace) {
                return Err(ConfigError::invalid_value("CIBOX_BASE_IMAGE", image).into());
            }
            self.build.base_image = image;
        }

        // CIBOX_TEMP_ROOT
        if let Some(root) = lookup("CIBOX_TEMP_ROOT") {
            self.paths.temp_root = Some(PathBuf::from(root));
        }

        // CIBOX_SHOW_BUILD_OUTPUT
        if let Some(show) = lookup("CIBOX_SHOW_BUILD_OUTPUT") {
            self.build.show_output = match show.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::invalid_value("CIBOX_SHOW_BUILD_OUTPUT", show).into())
                }
            };
        }

        Ok(())
    }

    /// Root under which build contexts are staged (with default)
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.paths
            .temp_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cibox"))
    }

    /// Directory receiving debug log files
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.temp_root().join(fixed_paths::LOGS_SUBDIR)
    }
}
