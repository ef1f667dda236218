// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    /// A dependency cycle; the first node is repeated at the end.
    #[error("Cycle detected: {}", .nodes.join(" -> "))]
    Cycle { nodes: Vec<String> },

    /// Nothing is running and nothing is free, yet nodes remain in the graph.
    #[error("Scheduler stalled with {} unfinished node(s): {}", .remaining.len(), .remaining.join(", "))]
    Stalled { remaining: Vec<String> },

    /// A worker raised an unexpected error (or panicked) instead of
    /// returning a structured result.
    #[error("Fatal error in worker '{worker}': {message}")]
    WorkerFatal { worker: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
