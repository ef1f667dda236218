// src/runner/mod.rs

//! Project runners: build the task graph of each selected project and drain
//! it, either one project at a time or with independent projects running
//! concurrently.

pub mod parallel;
pub mod sequential;
pub mod worker;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::context::BuildContext;
use crate::dag::{
    DependencyGraph, GraphScheduler, ScheduleOutcome, WorkerFactory, WorkerSpan,
    transitive_closure,
};
use crate::errors::{BuildError, Result};
use crate::task::{InstalledTasks, Project, Task, TaskGraphBuilder, TaskId, TaskResult};
use crate::types::ProjectStatus;

pub use parallel::ParallelProjectRunner;
pub use sequential::SequentialProjectRunner;
pub use worker::{TaskWorker, TaskWorkerFactory};

/// Outcome of a whole build.
#[derive(Debug, Clone)]
pub struct RunTargetResult {
    /// First failure, or success.
    pub result: TaskResult,
    /// Terminal status of every selected project.
    pub statuses: Vec<(String, ProjectStatus)>,
    /// `"project:task: N ms"` per task that ran.
    pub messages: Vec<String>,
    /// Outer scheduler history; empty for sequential builds.
    pub history: Vec<WorkerSpan>,
}

impl RunTargetResult {
    pub fn exit_code(&self) -> i32 {
        if self.result.success { 0 } else { 1 }
    }

    pub fn status_of(&self, project: &str) -> Option<ProjectStatus> {
        self.statuses
            .iter()
            .find(|(name, _)| name == project)
            .map(|(_, status)| *status)
    }

    /// Sum of the project build times, for parallel builds.
    pub fn sequential_time(&self) -> Option<Duration> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.history.iter().map(WorkerSpan::duration).sum())
        }
    }
}

pub type RunnerFuture<'a> = Pin<Box<dyn Future<Output = Result<RunTargetResult>> + Send + 'a>>;

pub trait ProjectRunner: Send + Sync {
    fn run_projects<'a>(
        &'a self,
        ctx: Arc<BuildContext>,
        requested: &'a [TaskId],
        projects: &'a [Project],
    ) -> RunnerFuture<'a>;
}

/// Expand the requested ids and pick the projects to build.
///
/// A qualified id `p:t` selects `p` and every project `p` transitively
/// depends on, and requests `t` in each of them where it exists. When any
/// id is unqualified, every project is selected.
pub fn resolve_targets(
    requested: &[TaskId],
    projects: &[Project],
    installed: &InstalledTasks,
) -> Result<(Vec<TaskId>, Vec<Project>)> {
    let by_name: HashMap<&str, &Project> = projects.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut ids: BTreeSet<TaskId> = BTreeSet::new();
    let mut selected: BTreeSet<&str> = BTreeSet::new();
    let mut any_unqualified = false;

    for id in requested {
        let Some(project) = id.project() else {
            any_unqualified = true;
            ids.insert(id.clone());
            continue;
        };
        if !by_name.contains_key(project) {
            return Err(BuildError::UnknownProject(project.to_string()));
        }

        let closure = transitive_closure(project, |name: &&str| match by_name.get(name).copied() {
            Some(p) => p
                .depends_on
                .iter()
                .map(String::as_str)
                .filter(|d| by_name.contains_key(d))
                .collect(),
            None => Vec::new(),
        });
        for name in closure {
            selected.insert(name);
            let dependent_id = TaskId::new(Some(name), id.task());
            if name == project || installed.has_task(&dependent_id) {
                ids.insert(dependent_id);
            } else {
                debug!(project = name, task = id.task(), "dependency project has no such task");
            }
        }
    }

    let projects: Vec<Project> = if any_unqualified || selected.is_empty() {
        projects.to_vec()
    } else {
        projects
            .iter()
            .filter(|p| selected.contains(p.name.as_str()))
            .cloned()
            .collect()
    };

    Ok((ids.into_iter().collect(), projects))
}

/// Projects in dependency order (dependencies first). Dependencies outside
/// `projects` are ignored.
pub fn project_order(projects: &[Project]) -> Result<Vec<&Project>> {
    let by_name: HashMap<&str, &Project> = projects.iter().map(|p| (p.name.as_str(), p)).collect();
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for p in projects {
        graph.add_node(p.name.as_str());
    }
    for p in projects {
        for dep in p.depends_on.iter().filter(|d| by_name.contains_key(d.as_str())) {
            graph.add_edge(dep.as_str(), p.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().filter_map(|n| by_name.get(n).copied()).collect()),
        Err(cycle) => {
            let deps = DependencyGraph::new();
            for p in projects {
                deps.add_node(p.name.clone());
                for dep in p.depends_on.iter().filter(|d| by_name.contains_key(d.as_str())) {
                    deps.add_edge(p.name.clone(), dep.clone());
                }
            }
            let nodes = deps
                .find_cycle()
                .unwrap_or_else(|| vec![cycle.node_id().to_string()]);
            Err(BuildError::Cycle { nodes })
        }
    }
}

/// The acyclic task graph of one project.
pub(crate) fn build_project_graph(
    ctx: &BuildContext,
    project: &Project,
    requested: &[TaskId],
) -> Result<DependencyGraph<Arc<Task>>> {
    let installed = ctx.installed();
    let nodes = installed.tasks_by_name(&project.name);
    let known = installed.task_names();
    let graph = TaskGraphBuilder::new(installed.relations())
        .with_known_tasks(&known)
        .build(&project.name, requested, &nodes)?;
    graph.ensure_acyclic()?;
    Ok(graph)
}

/// Task graphs of every project, built before anything runs so that an
/// unknown task or a task cycle in any project fails the build up front.
pub(crate) fn build_project_graphs<'p>(
    ctx: &BuildContext,
    projects: impl IntoIterator<Item = &'p Project>,
    requested: &[TaskId],
) -> Result<HashMap<String, DependencyGraph<Arc<Task>>>> {
    projects
        .into_iter()
        .map(|p| Ok((p.name.clone(), build_project_graph(ctx, p, requested)?)))
        .collect()
}

/// Drain a graph produced by [`build_project_graph`].
pub(crate) async fn run_project_graph(
    ctx: &Arc<BuildContext>,
    project: &Project,
    graph: DependencyGraph<Arc<Task>>,
) -> Result<ScheduleOutcome> {
    if graph.is_empty() {
        debug!(project = %project.name, "no tasks to run");
        return Ok(ScheduleOutcome {
            result: TaskResult::ok(),
            history: Vec::new(),
        });
    }
    debug!(project = %project.name, graph = %graph.dump(), "about to run task graph");

    let factory: Arc<dyn WorkerFactory<Arc<Task>>> =
        Arc::new(TaskWorkerFactory::new(Arc::clone(ctx)));
    GraphScheduler::new(graph, factory, ctx.options().task_scheduler())
        .run()
        .await
}
