// src/report.rs

//! Build listeners and the end-of-build report.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::task::{Project, Task};
use crate::types::ProjectStatus;

/// Observer of build progress. Every method defaults to doing nothing.
pub trait BuildListener: Send + Sync {
    fn project_start(&self, _project: &Project) {}
    fn project_end(&self, _project: &Project, _status: ProjectStatus) {}
    fn task_start(&self, _task: &Task) {}
    fn task_end(&self, _task: &Task, _success: bool, _elapsed: Duration) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTiming {
    /// `project:task`.
    pub task: String,
    pub success: bool,
    pub duration: Duration,
}

impl TaskTiming {
    /// `"project:task: N ms"`.
    pub fn message(&self) -> String {
        format!("{}: {} ms", self.task, self.duration.as_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub status: ProjectStatus,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct ReportState {
    running: HashMap<String, Instant>,
    projects: Vec<ProjectRecord>,
    timings: Vec<TaskTiming>,
}

/// Records project statuses and task timings as the build runs, and renders
/// the summary at the end.
#[derive(Debug)]
pub struct BuildReport {
    started: Instant,
    state: Mutex<ReportState>,
}

impl Default for BuildReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildReport {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: Mutex::new(ReportState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn timings(&self) -> Vec<TaskTiming> {
        self.state().timings.clone()
    }

    /// One `"project:task: N ms"` line per finished task, in completion order.
    pub fn messages(&self) -> Vec<String> {
        self.state().timings.iter().map(TaskTiming::message).collect()
    }

    pub fn projects(&self) -> Vec<ProjectRecord> {
        self.state().projects.clone()
    }

    /// Summary lines. `sequential_time` is given for parallel builds only.
    pub fn render(
        &self,
        success: bool,
        profiling: bool,
        sequential_time: Option<Duration>,
    ) -> Vec<String> {
        let state = self.state();
        let mut lines = Vec::new();

        if profiling && !state.timings.is_empty() {
            let mut timings = state.timings.clone();
            timings.sort_by(|a, b| b.duration.cmp(&a.duration));
            lines.push("TIMINGS (SECONDS)".to_string());
            lines.push("=================".to_string());
            for t in &timings {
                lines.push(format!("{:>8.2}  {}", t.duration.as_secs_f64(), t.task));
            }
        }

        if !state.projects.is_empty() {
            let width = state
                .projects
                .iter()
                .map(|p| p.name.len())
                .max()
                .unwrap_or(0)
                .max("Project".len());
            lines.push(format!("{:<width$}  {:<12}  {}", "Project", "Build status", "Time"));
            for p in &state.projects {
                lines.push(format!(
                    "{:<width$}  {:<12}  {:.2} s",
                    p.name,
                    p.status.to_string(),
                    p.duration.as_secs_f64()
                ));
            }
        }

        let secs = self.started.elapsed().as_secs();
        let verdict = match (success, sequential_time) {
            (false, _) => "BUILD FAILED".to_string(),
            (true, Some(seq)) => format!(
                "PARALLEL BUILD SUCCESSFUL ({secs} SECONDS), sequential build would have taken {} seconds",
                seq.as_secs()
            ),
            (true, None) => format!("BUILD SUCCESSFUL ({secs} SECONDS)"),
        };
        lines.push(verdict);
        lines
    }

    /// Log the summary through `tracing`.
    pub fn emit(&self, success: bool, profiling: bool, sequential_time: Option<Duration>) {
        for line in self.render(success, profiling, sequential_time) {
            if success {
                info!("{line}");
            } else {
                error!("{line}");
            }
        }
    }
}

impl BuildListener for BuildReport {
    fn project_start(&self, project: &Project) {
        self.state()
            .running
            .insert(project.name.clone(), Instant::now());
    }

    fn project_end(&self, project: &Project, status: ProjectStatus) {
        let mut state = self.state();
        let duration = state
            .running
            .remove(&project.name)
            .map(|start| start.elapsed())
            .unwrap_or_default();
        state.projects.push(ProjectRecord {
            name: project.name.clone(),
            status,
            duration,
        });
    }

    fn task_end(&self, task: &Task, success: bool, elapsed: Duration) {
        self.state().timings.push(TaskTiming {
            task: task.qualified_name(),
            success,
            duration: elapsed,
        });
    }
}
