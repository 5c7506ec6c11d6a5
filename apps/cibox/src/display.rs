//! Terminal rendering of build progress and results

use cibox_builder::ProgressSink;
use cibox_types::{ColorChoice, PipelineReport};
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io;
use std::sync::Mutex;

/// Bar layout; everything but `{msg}` fits in the reserved label chrome
const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:20.cyan/blue}] {pos:>3}/{len:3} {msg}";

/// Resolve the color setting against the terminal
pub fn colors_enabled(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => Term::stderr().features().colors_supported(),
    }
}

/// Current terminal width in columns, if stderr is a terminal
pub fn terminal_width() -> Option<usize> {
    let term = Term::stderr();
    if term.is_term() {
        Some(usize::from(term.size().1))
    } else {
        None
    }
}

/// Progress bar and banners on stderr
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
    term: Term,
    colors: bool,
    /// Suppress banners as well as the bar
    quiet: bool,
    /// Raw build output goes to the terminal, which would tear a live bar
    bar_hidden: bool,
}

impl TerminalProgress {
    pub fn new(colors: bool, quiet: bool, relaying_build_output: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            term: Term::stderr(),
            colors,
            quiet,
            bar_hidden: quiet || relaying_build_output,
        }
    }

    fn with_bar<F>(&self, total: usize, f: F)
    where
        F: FnOnce(&ProgressBar),
    {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| self.create_bar(total));
        f(bar);
    }

    fn create_bar(&self, total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        if self.bar_hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut guard| guard.take())
    }

    /// The bar in its completed state, created when no step was ever reported
    fn completed_bar(&self, total: usize) -> ProgressBar {
        let bar = self.take_bar().unwrap_or_else(|| self.create_bar(total));
        bar.set_length(total as u64);
        bar.set_position(total as u64);
        bar.finish_with_message("done");
        bar
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&self, current: usize, total: usize, label: &str) {
        self.with_bar(total, |bar| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
            bar.set_message(label.to_string());
        });
    }

    fn finish(&self, total: usize) {
        self.completed_bar(total);
    }

    fn abandon(&self) {
        if let Some(bar) = self.take_bar() {
            bar.abandon();
        }
    }

    fn banner(&self, message: &str, success: bool) {
        if self.quiet {
            return;
        }
        let (marker, style) = if success {
            ("[OK]", Style::new().green().bold())
        } else {
            ("[FAILED]", Style::new().red().bold())
        };
        let marker = if self.colors {
            style.apply_to(marker).to_string()
        } else {
            marker.to_string()
        };
        let _ = self.term.write_line(&format!("{marker} {message}"));
    }
}

/// Print the final report on stdout
pub fn render_report(report: &PipelineReport, json_output: bool) -> io::Result<()> {
    if json_output {
        let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
        println!("{json}");
    }
    Ok(())
}
