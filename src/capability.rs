//! Small capability traits injected into the renderer and script runtime.
//!
//! Nothing in the core reaches for stdout or the wall clock directly; it is
//! handed a [`Logger`] and a [`Clock`] at construction instead, which keeps
//! the transport and the time source swappable in tests.

use std::io::Write;
use std::time::Instant;

/// Where user-facing messages go (script `print`, command replies, errors).
pub trait Logger {
    fn log(&self, message: &str);
}

/// Milliseconds since an arbitrary, fixed start point.
pub trait Clock {
    fn millis(&self) -> u64;
}

/// Writes each message as one line on stdout, the reply side of the transport.
#[derive(Debug, Default)]
pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn log(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{message}").and_then(|_| out.flush()) {
            tracing::warn!("Failed to write reply: {}", e);
        }
    }
}

/// Wall clock measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
