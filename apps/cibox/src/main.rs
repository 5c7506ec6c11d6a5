//! cibox - run a project's CI job in a local container
//!
//! Reads the job manifest, builds an image with the job's setup phases baked
//! in, then runs the job's script against the live checkout.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::Cli;
use crate::display::{colors_enabled, render_report, terminal_width, TerminalProgress};
use crate::error::CliError;
use crate::events::EventHandler;
use cibox_builder::{label_width_for, load_job_spec, Orchestrator, PipelineConfig};
use cibox_config::Config;
use cibox_events::EventReceiver;
use cibox_platform::{DockerEngine, GitFileLister};
use cibox_types::{Job, PipelineReport};
use clap::Parser;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            e.exit_code()
        }
    };
    process::exit(code);
}

/// Main application logic; returns the process exit code
async fn run(cli: Cli) -> Result<i32, CliError> {
    // Load configuration with proper precedence:
    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli);

    init_tracing(cli.global.json, cli.global.debug, &config.logs_dir());
    info!("Starting cibox v{}", env!("CARGO_PKG_VERSION"));

    let job = load_job(&cli).await?;
    info!(image_tag = %job.image_tag(), "job validated");

    let (event_sender, event_receiver) = cibox_events::channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let colors = colors_enabled(config.general.color);
    let mut pipeline_config = PipelineConfig::from_config(&config);
    if let Some(width) = terminal_width() {
        pipeline_config.label_width = label_width_for(width);
    }

    let progress = Arc::new(TerminalProgress::new(
        colors,
        cli.global.json,
        config.build.show_output,
    ));
    let orchestrator = Orchestrator::new(
        Arc::new(DockerEngine::new(config.engine.program.clone())),
        Arc::new(GitFileLister::new(config.engine.vcs_program.clone())),
        pipeline_config,
    )?
    .with_progress(progress)
    .with_event_sender(event_sender)
    .with_cancellation(cancel_rx);

    let mut event_handler = EventHandler::new(colors, cli.global.json);
    let result =
        execute_with_events(&orchestrator, &job, event_receiver, &mut event_handler, &cancel_tx)
            .await;
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            // Relayed builds already showed their output
            if !cli.global.json && !config.build.show_output {
                if let Some(output) = e.build_output() {
                    eprint!("{output}");
                }
            }
            return Err(e);
        }
    };

    render_report(&report, cli.global.json)?;

    info!(exit_code = ?report.run.exit_code, "Job finished");
    Ok(report.run.process_exit_code())
}

/// Build the job from the manifest and CLI overrides
async fn load_job(cli: &Cli) -> Result<Job, CliError> {
    let mut spec = load_job_spec(&cli.project_dir, cli.file.as_deref()).await?;

    if let Some(runtime) = &cli.runtime {
        spec.runtime_version = Some(runtime.clone());
    }
    spec.env.extend(cli.env.iter().cloned());
    spec.id.clone_from(&cli.id);

    Ok(Job::validate(spec)?)
}

/// Run the pipeline while draining events and watching for Ctrl-C
async fn execute_with_events(
    orchestrator: &Orchestrator,
    job: &Job,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
    cancel: &watch::Sender<bool>,
) -> Result<PipelineReport, CliError> {
    let mut pipeline = Box::pin(orchestrator.execute(job));
    let mut interrupted = false;

    loop {
        select! {
            // Pipeline completed
            result = &mut pipeline => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            // Event received
            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => { /* Channel closed: keep waiting for the pipeline to finish */ }
                }
            }

            // First interrupt cancels the engine process
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                interrupted = true;
                cancel.send_replace(true);
            }
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, log_dir: &Path) {
    // Check if debug logging is enabled
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if json_mode && !debug_enabled {
        // JSON mode: keep stdout and stderr clean for the report
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else if debug_enabled {
        // Debug mode: structured JSON logs to file
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("Warning: Failed to create log directory: {e}");
        }

        let log_file = log_dir.join(format!(
            "cibox-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| tracing_subscriber::EnvFilter::new("info,cibox=debug,cibox_builder=debug"),
                        ),
                    )
                    .init();

                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
            }
            Err(e) => {
                eprintln!("Warning: Failed to create log file: {e}");
                // Fallback to stderr
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                    )
                    .init();
            }
        }
    } else {
        // Normal mode: minimal logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, cli: &Cli) {
    if let Some(color) = cli.global.color {
        config.general.color = color;
    }
    if let Some(root) = &cli.temp_root {
        config.paths.temp_root = Some(root.clone());
    }
    if let Some(engine) = &cli.engine {
        config.engine.program.clone_from(engine);
    }
    if let Some(image) = &cli.base_image {
        config.build.base_image.clone_from(image);
    }
    if cli.verbose {
        config.build.show_output = true;
    }
}
