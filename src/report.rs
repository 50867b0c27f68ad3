// CLASSIFICATION: COMMUNITY
// Filename: report.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Diagnostic reporting capability handed to the store and validator.
//!
//! Components never reach for a process-wide logger; they receive a
//! [`StatusReporter`] at construction. [`LogReporter`] forwards to the
//! `log` facade and is what the firmware uses, [`MemoryReporter`] keeps
//! lines around so tests can assert on them.

use std::sync::{Arc, Mutex};

use log::Level;

/// Log target used for every line emitted by [`LogReporter`].
pub const LOG_TARGET: &str = "ears_nvs";

/// Sink for human-readable status and diagnostic lines.
pub trait StatusReporter: Send + Sync {
    fn report(&self, level: Level, line: &str);

    fn info(&self, line: &str) {
        self.report(Level::Info, line);
    }

    fn warn(&self, line: &str) {
        self.report(Level::Warn, line);
    }

    fn error(&self, line: &str) {
        self.report(Level::Error, line);
    }
}

/// Shared handle type passed between components.
pub type SharedReporter = Arc<dyn StatusReporter>;

/// Forwards every line to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&self, level: Level, line: &str) {
        log::log!(target: LOG_TARGET, level, "{line}");
    }
}

/// Convenience constructor for the default reporter.
pub fn log_reporter() -> SharedReporter {
    Arc::new(LogReporter)
}

/// Captures reported lines in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of every line reported so far, oldest first.
    pub fn lines(&self) -> Vec<(Level, String)> {
        match self.lines.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// True when any line at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(lvl, line)| *lvl == level && line.contains(needle))
    }
}

impl StatusReporter for MemoryReporter {
    fn report(&self, level: Level, line: &str) {
        log::log!(target: LOG_TARGET, level, "{line}");
        match self.lines.lock() {
            Ok(mut guard) => guard.push((level, line.to_string())),
            Err(poisoned) => poisoned.into_inner().push((level, line.to_string())),
        }
    }
}
