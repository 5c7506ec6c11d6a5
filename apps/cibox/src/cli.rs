//! Command line interface definition

use clap::Parser;
use cibox_types::{ColorChoice, EnvVar};
use std::path::PathBuf;

/// cibox - run a project's CI job in a local container
#[derive(Parser)]
#[command(name = "cibox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a project's CI job into a container image and run it")]
#[command(long_about = None)]
pub struct Cli {
    /// Project checkout to build
    #[arg(value_name = "PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Job manifest (default: <PROJECT_DIR>/.travis.yml)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Runtime version, overrides the manifest
    #[arg(long, value_name = "VERSION")]
    pub runtime: Option<String>,

    /// Extra environment variable for the image (repeatable)
    #[arg(short = 'e', long = "env", value_name = "NAME=VALUE", value_parser = parse_env)]
    pub env: Vec<EnvVar>,

    /// Fixed job id (default: random)
    #[arg(long)]
    pub id: Option<String>,

    /// Directory receiving build contexts and logs
    #[arg(long, value_name = "PATH")]
    pub temp_root: Option<PathBuf>,

    /// Container engine program
    #[arg(long, value_name = "PROGRAM")]
    pub engine: Option<String>,

    /// Base image repository
    #[arg(long, value_name = "IMAGE")]
    pub base_image: Option<String>,

    /// Show raw build output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Arguments shared with every invocation
#[derive(Parser)]
pub struct GlobalArgs {
    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging to <temp root>/logs/
    #[arg(long)]
    pub debug: bool,

    /// Color output control
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_env(raw: &str) -> Result<EnvVar, String> {
    EnvVar::parse_assignment(raw).map_err(|e| e.to_string())
}
