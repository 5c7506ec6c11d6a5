//! Event handling for the CLI

use crate::logging::log_event_with_tracing;
use cibox_events::{AppEvent, GeneralEvent};
use console::{Style, Term};

/// Logs every event and surfaces warnings to the user
pub struct EventHandler {
    term: Term,
    colors: bool,
    quiet: bool,
}

impl EventHandler {
    pub fn new(colors: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors,
            quiet,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        log_event_with_tracing(&event);

        if self.quiet {
            return;
        }
        if let AppEvent::General(GeneralEvent::Warning { message, context }) = &event {
            let text = match context {
                Some(context) => format!("{message} ({context})"),
                None => message.clone(),
            };
            self.show("warning:", &text, Style::new().yellow().bold());
        }
    }

    fn show(&self, prefix: &str, message: &str, style: Style) {
        let prefix = if self.colors {
            style.apply_to(prefix).to_string()
        } else {
            prefix.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}
