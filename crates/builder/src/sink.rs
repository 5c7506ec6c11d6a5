//! Output seams of the orchestrator
//!
//! The orchestrator never writes to the terminal directly. Progress goes to a
//! [`ProgressSink`] and container output to an [`OutputRelay`].

use cibox_errors::Error;
use cibox_platform::{OutputChannel, OutputChunk};
use std::io::Write;

/// Receives build progress and phase banners
pub trait ProgressSink: Send + Sync {
    /// A new step was reached
    fn update(&self, current: usize, total: usize, label: &str);

    /// The build completed successfully
    fn finish(&self, total: usize);

    /// The build stopped early; the display must end on a fresh line
    fn abandon(&self);

    /// Phase boundary message
    fn banner(&self, message: &str, success: bool);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _current: usize, _total: usize, _label: &str) {}

    fn finish(&self, _total: usize) {}

    fn abandon(&self) {}

    fn banner(&self, _message: &str, _success: bool) {}
}

/// Forwards raw container output to the caller
pub trait OutputRelay: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be written.
    fn relay(&self, chunk: &OutputChunk) -> Result<(), Error>;
}

/// Relay writing to this process's stdout and stderr, unbuffered
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioRelay;

impl OutputRelay for StdioRelay {
    fn relay(&self, chunk: &OutputChunk) -> Result<(), Error> {
        match chunk.channel {
            OutputChannel::Out => {
                let mut out = std::io::stdout().lock();
                out.write_all(&chunk.data)?;
                out.flush()?;
            }
            OutputChannel::Err => {
                let mut err = std::io::stderr().lock();
                err.write_all(&chunk.data)?;
                err.flush()?;
            }
        }
        Ok(())
    }
}
