// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Logging verbosity, as accepted in `[build].log_level` and `BUILDGRAPH_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

/// Terminal status of one project in a build.
///
/// `Skipped` is distinct from `Failed`: the project never ran because
/// something it depends on (or the build as a whole) failed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Success => "SUCCESS",
            ProjectStatus::Failed => "FAILED",
            ProjectStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}
