// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`, plus the per-unit
//! log buffer used by scheduler workers.
//!
//! Priority for determining the log level:
//! 1. an explicit level (e.g. `[build].log_level`)
//! 2. `BUILDGRAPH_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that task output keeps STDOUT to itself.

use anyhow::{Result, anyhow};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::fmt;

use crate::types::LogLevel;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV_VAR: &str = "BUILDGRAPH_LOG";

/// Initialise global logging subscriber.
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level = match level {
        Some(lvl) => tracing_level(lvl),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| s.parse::<LogLevel>().ok())
            .map(tracing_level)
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Like [`init_logging`], but leaves an already installed subscriber in
/// place. Returns whether this call installed one.
pub fn try_init_logging(level: Option<LogLevel>) -> bool {
    match init_logging(level) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "keeping existing log subscriber");
            false
        }
    }
}

fn tracing_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

/// One buffered log line produced by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Log lines produced by one unit of work (a task or a whole project).
///
/// Workers write here instead of logging directly; the scheduler flushes
/// the buffer when the unit completes, so output from concurrently running
/// units never interleaves.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    unit: String,
    lines: Vec<LogLine>,
}

impl LogBuffer {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            lines: Vec::new(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.lines.push(LogLine {
            level,
            message: message.into(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Append every line of `other` (used when a project absorbs the logs of
    /// its tasks).
    pub fn extend(&mut self, other: LogBuffer) {
        self.lines.extend(other.lines);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Emit all buffered lines through `tracing`, in order.
    pub fn flush(self) {
        let unit = self.unit;
        for line in self.lines {
            match line.level {
                LogLevel::Error => error!(unit = %unit, "{}", line.message),
                LogLevel::Warn => warn!(unit = %unit, "{}", line.message),
                LogLevel::Info => info!(unit = %unit, "{}", line.message),
                LogLevel::Debug => debug!(unit = %unit, "{}", line.message),
                LogLevel::Trace => trace!(unit = %unit, "{}", line.message),
            }
        }
    }
}
