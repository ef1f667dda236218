// src/runner/sequential.rs

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::context::BuildContext;
use crate::runner::{
    ProjectRunner, RunTargetResult, RunnerFuture, build_project_graphs, project_order,
    run_project_graph,
};
use crate::task::{Project, TaskId, TaskResult};
use crate::types::ProjectStatus;

/// Builds projects one at a time in dependency order. A project whose
/// dependency failed or was skipped is skipped; unrelated projects still
/// build.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialProjectRunner;

impl SequentialProjectRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectRunner for SequentialProjectRunner {
    fn run_projects<'a>(
        &'a self,
        ctx: Arc<BuildContext>,
        requested: &'a [TaskId],
        projects: &'a [Project],
    ) -> RunnerFuture<'a> {
        Box::pin(async move {
            let order = project_order(projects)?;
            let mut graphs = build_project_graphs(&ctx, order.iter().copied(), requested)?;
            let mut result = TaskResult::ok();
            let mut statuses = Vec::with_capacity(order.len());
            let mut unsuccessful: HashSet<&str> = HashSet::new();

            for project in order {
                let blocked: Vec<&str> = project
                    .depends_on
                    .iter()
                    .map(String::as_str)
                    .filter(|d| unsuccessful.contains(d))
                    .collect();

                if !blocked.is_empty() {
                    warn!(
                        project = %project.name,
                        "Not building project {} since it depends on failed project(s) {}",
                        project.name,
                        blocked.join(",")
                    );
                    unsuccessful.insert(&project.name);
                    ctx.project_end(project, ProjectStatus::Skipped);
                    statuses.push((project.name.clone(), ProjectStatus::Skipped));
                    continue;
                }

                info!(project = %project.name, "Building {}", project.name);
                ctx.project_start(project);
                let graph = graphs.remove(&project.name).unwrap_or_default();
                let outcome = run_project_graph(&ctx, project, graph).await?;

                let status = if outcome.result.success {
                    ProjectStatus::Success
                } else {
                    unsuccessful.insert(&project.name);
                    if result.success {
                        result = outcome.result.clone();
                    }
                    ProjectStatus::Failed
                };
                ctx.project_end(project, status);
                statuses.push((project.name.clone(), status));
            }

            Ok(RunTargetResult {
                result,
                statuses,
                messages: ctx.report().messages(),
                history: Vec::new(),
            })
        })
    }
}
