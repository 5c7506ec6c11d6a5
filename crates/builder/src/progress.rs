//! Build progress tracking from streamed engine output

use cibox_errors::Error;
use cibox_platform::OutputChannel;
use regex::Regex;
use std::sync::Arc;

/// Columns reserved for the bar, counters and elapsed time
pub const PROGRESS_CHROME_WIDTH: usize = 44;

/// Label width available on a terminal of `terminal_width` columns
#[must_use]
pub fn label_width_for(terminal_width: usize) -> usize {
    terminal_width.saturating_sub(PROGRESS_CHROME_WIDTH)
}

/// A step marker found in a line of build output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMarker {
    pub current: usize,
    pub total: usize,
}

/// Recognizes step markers in engine output
pub trait StepMarkerParser: Send + Sync {
    fn parse(&self, line: &str) -> Option<StepMarker>;
}

/// Parser for the classic builder's `Step <n>/<m> :` lines
#[derive(Debug, Clone)]
pub struct ClassicStepParser {
    pattern: Regex,
}

impl ClassicStepParser {
    /// # Errors
    ///
    /// Returns an error if the marker pattern fails to compile.
    pub fn new() -> Result<Self, Error> {
        let pattern =
            Regex::new(r"Step (\d+)/(\d+) :").map_err(|e| Error::internal(e.to_string()))?;
        Ok(Self { pattern })
    }
}

impl StepMarkerParser for ClassicStepParser {
    fn parse(&self, line: &str) -> Option<StepMarker> {
        let captures = self.pattern.captures(line)?;
        let current = captures.get(1)?.as_str().parse().ok()?;
        let total = captures.get(2)?.as_str().parse().ok()?;
        Some(StepMarker { current, total })
    }
}

/// Progress of one image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub total_steps: usize,
    pub current_step: usize,
    pub current_label: String,
}

/// Folds step markers into a [`ProgressState`]
pub struct ProgressTracker {
    state: ProgressState,
    descriptor_lines: Vec<String>,
    label_width: usize,
    parser: Arc<dyn StepMarkerParser>,
}

impl ProgressTracker {
    pub fn new(
        descriptor_lines: Vec<String>,
        label_width: usize,
        parser: Arc<dyn StepMarkerParser>,
    ) -> Self {
        Self {
            state: ProgressState {
                total_steps: descriptor_lines.len(),
                current_step: 0,
                current_label: String::new(),
            },
            descriptor_lines,
            label_width,
            parser,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Offer one output line; returns the new state when it advanced
    ///
    /// Markers for a different step count, out of range or behind the
    /// current step are ignored.
    pub fn observe_line(&mut self, line: &str) -> Option<&ProgressState> {
        let marker = self.parser.parse(line)?;
        if marker.total != self.state.total_steps
            || marker.current == 0
            || marker.current > self.state.total_steps
            || marker.current <= self.state.current_step
        {
            return None;
        }

        self.state.current_step = marker.current;
        // Index is zero-based, so this is the instruction after the reported one
        self.state.current_label = self
            .descriptor_lines
            .get(marker.current)
            .map(|line| truncate_label(line, self.label_width))
            .unwrap_or_default();
        Some(&self.state)
    }
}

fn truncate_label(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}

/// Splits chunked output into complete lines, per channel
#[derive(Debug, Default)]
pub struct LineBuffer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every line it completes
    pub fn push(&mut self, channel: OutputChannel, data: &[u8]) -> Vec<String> {
        let buffer = match channel {
            OutputChannel::Out => &mut self.stdout,
            OutputChannel::Err => &mut self.stderr,
        };
        buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Remaining partial lines once the stream has ended
    pub fn finish(&mut self) -> Vec<(OutputChannel, String)> {
        let mut rest = Vec::new();
        for (channel, buffer) in [
            (OutputChannel::Out, &mut self.stdout),
            (OutputChannel::Err, &mut self.stderr),
        ] {
            if !buffer.is_empty() {
                rest.push((channel, decode_line(buffer)));
                buffer.clear();
            }
        }
        rest
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}
