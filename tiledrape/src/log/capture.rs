//! In-memory logger for assertions on emitted messages.

use crate::log::{LogLevel, Logger};
use parking_lot::Mutex;
use std::fmt::Arguments;

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub level: LogLevel,
    pub message: String,
}

/// Logger that records every message it receives.
///
/// ```
/// use tiledrape::log::{CaptureLogger, LogLevel, Logger};
/// use tiledrape::log_warn;
///
/// let logger = CaptureLogger::new();
/// log_warn!(logger, "border tile {} not requested", "37hn2");
/// assert!(logger.contains(LogLevel::Warn, "not requested"));
/// ```
#[derive(Debug, Default)]
pub struct CaptureLogger {
    lines: Mutex<Vec<CapturedLine>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().clone()
    }

    /// Messages logged at exactly `level`.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.level == level)
            .map(|line| line.message.clone())
            .collect()
    }

    /// True if a message at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|line| line.level == level && line.message.contains(needle))
    }
}

impl Logger for CaptureLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        self.lines.lock().push(CapturedLine {
            level,
            message: args.to_string(),
        });
    }
}
