// src/lib.rs

pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod fs;
pub mod incremental;
pub mod logging;
pub mod report;
pub mod runner;
pub mod task;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::context::BuildContext;
use crate::errors::{BuildError, Result};
use crate::runner::{
    ParallelProjectRunner, ProjectRunner, RunTargetResult, SequentialProjectRunner,
    resolve_targets,
};
use crate::task::{Project, TaskId, TaskRegistry};

/// Build `task_names` (`"task"` or `"project:task"`) across `projects`.
///
/// Every name must match a known task, otherwise nothing runs and
/// [`BuildError::UnknownTask`] is returned. Projects are built by the
/// sequential or parallel runner depending on `[build].parallel`, and the
/// build report is logged at the end.
pub async fn run_targets(
    ctx: Arc<BuildContext>,
    task_names: &[String],
    projects: &[Project],
) -> Result<RunTargetResult> {
    let requested: Vec<TaskId> = task_names.iter().map(|n| TaskId::parse(n)).collect();

    for id in &requested {
        if let Some(project) = id.project() {
            if !projects.iter().any(|p| p.name == project) {
                return Err(BuildError::UnknownProject(project.to_string()));
            }
        }
        if !ctx.installed().has_task(id) {
            return Err(BuildError::UnknownTask(id.to_string()));
        }
    }

    let (requested, selected) = resolve_targets(&requested, projects, ctx.installed())?;
    let names: Vec<&str> = selected.iter().map(|p| p.name.as_str()).collect();
    info!(tasks = ?task_names, projects = ?names, parallel = ctx.options().parallel, "running targets");
    debug!(requested = ?requested, "resolved task ids");

    let runner: Box<dyn ProjectRunner> = if ctx.options().parallel {
        Box::new(ParallelProjectRunner::new())
    } else {
        Box::new(SequentialProjectRunner::new())
    };
    let outcome = runner
        .run_projects(Arc::clone(&ctx), &requested, &selected)
        .await?;

    ctx.report().emit(
        outcome.result.success,
        ctx.options().profiling,
        outcome.sequential_time(),
    );
    Ok(outcome)
}

/// Install the registry's tasks for `projects`, then [`run_targets`] with a
/// context built from `config`.
///
/// Installs the stderr log subscriber at `[build].log_level` unless the
/// process already has one.
pub async fn run(
    config: &ConfigFile,
    registry: &TaskRegistry,
    task_names: &[String],
    projects: &[Project],
) -> Result<RunTargetResult> {
    logging::try_init_logging(config.build.log_level);
    let installed = registry.install(projects);
    let ctx = Arc::new(BuildContext::new(config.build.clone(), installed));
    run_targets(ctx, task_names, projects).await
}
