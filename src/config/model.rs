// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::SchedulerOptions;
use crate::incremental::BUILD_INFO_FILE;
use crate::types::LogLevel;

/// Top-level config as deserialized from TOML, before validation.
///
/// ```toml
/// [build]
/// parallel = true
/// project_concurrency = 4
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildOptions,
}

/// Validated configuration. Build through `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub build: BuildOptions,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(build: BuildOptions) -> Self {
        Self { build }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOptions {
    /// Run independent projects concurrently.
    #[serde(default)]
    pub parallel: bool,

    /// How many projects may build at once in a parallel build.
    #[serde(default = "default_project_concurrency")]
    pub project_concurrency: usize,

    /// How many tasks of one project may run at once.
    #[serde(default = "default_task_concurrency")]
    pub task_concurrency: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Report every task as successful without running it.
    #[serde(default)]
    pub dry_run: bool,

    /// When false, incremental tasks always run.
    #[serde(default = "default_true")]
    pub incremental: bool,

    /// Include per-task timings in the build report.
    #[serde(default)]
    pub profiling: bool,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

fn default_project_concurrency() -> usize {
    5
}

fn default_task_concurrency() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".buildgraph")
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            project_concurrency: default_project_concurrency(),
            task_concurrency: default_task_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            dry_run: false,
            incremental: true,
            profiling: false,
            state_dir: default_state_dir(),
            log_level: None,
        }
    }
}

impl BuildOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Options for the scheduler that runs the tasks of one project.
    pub fn task_scheduler(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.task_concurrency,
            poll_interval: self.poll_interval(),
        }
    }

    /// Options for the scheduler that runs whole projects.
    pub fn project_scheduler(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.project_concurrency,
            poll_interval: self.poll_interval(),
        }
    }

    pub fn build_info_path(&self) -> PathBuf {
        self.state_dir.join(BUILD_INFO_FILE)
    }
}
