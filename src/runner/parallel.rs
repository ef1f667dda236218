// src/runner/parallel.rs

//! Builds independent projects concurrently.
//!
//! Projects become nodes of an outer [`DependencyGraph`] drained by a second
//! [`GraphScheduler`]. Every task graph is built and checked for cycles
//! before the first project starts; each project worker then drains its own
//! graph with an inner scheduler. After the first failed project nothing new
//! is submitted, and every project that never ran ends up `Skipped`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::context::BuildContext;
use crate::dag::{DependencyGraph, GraphScheduler, NodeResult, Worker, WorkerFactory, WorkerFuture};
use crate::logging::LogBuffer;
use crate::runner::{
    ProjectRunner, RunTargetResult, RunnerFuture, build_project_graphs, run_project_graph,
};
use crate::task::{Project, Task, TaskId};
use crate::types::ProjectStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelProjectRunner;

impl ParallelProjectRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Outer graph node; identity is the project name.
#[derive(Debug, Clone)]
struct ProjectNode(Arc<Project>);

impl PartialEq for ProjectNode {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for ProjectNode {}

impl Hash for ProjectNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Display for ProjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

type Statuses = Arc<Mutex<Vec<(String, ProjectStatus)>>>;
/// Inner task graphs, taken by each project worker when it starts.
type TaskGraphs = Arc<Mutex<HashMap<String, DependencyGraph<Arc<Task>>>>>;

struct ProjectWorker {
    ctx: Arc<BuildContext>,
    node: ProjectNode,
    graphs: TaskGraphs,
    statuses: Statuses,
}

impl Worker<ProjectNode> for ProjectWorker {
    fn name(&self) -> String {
        self.node.0.name.clone()
    }

    fn call(self: Box<Self>) -> WorkerFuture<ProjectNode> {
        Box::pin(async move {
            let ProjectWorker {
                ctx,
                node,
                graphs,
                statuses,
            } = *self;
            let project = Arc::clone(&node.0);
            let mut log = LogBuffer::new(project.name.clone());
            let graph = graphs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&project.name)
                .unwrap_or_default();

            ctx.project_start(&project);
            let outcome = run_project_graph(&ctx, &project, graph).await?;

            let status = if outcome.result.success {
                log.info(format!("Project {} built successfully", project.name));
                ProjectStatus::Success
            } else {
                log.error(format!(
                    "Project {} failed: {}",
                    project.name,
                    outcome.result.error_message.as_deref().unwrap_or("task failed")
                ));
                ProjectStatus::Failed
            };
            statuses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((project.name.clone(), status));
            ctx.project_end(&project, status);

            Ok::<_, anyhow::Error>(NodeResult::new(node, outcome.result).with_log(log))
        })
    }
}

struct ProjectWorkerFactory {
    ctx: Arc<BuildContext>,
    graphs: TaskGraphs,
    statuses: Statuses,
}

impl WorkerFactory<ProjectNode> for ProjectWorkerFactory {
    fn create_workers(&self, nodes: Vec<ProjectNode>) -> Vec<Box<dyn Worker<ProjectNode>>> {
        nodes
            .into_iter()
            .map(|node| {
                info!(project = %node, "Building {}", node);
                Box::new(ProjectWorker {
                    ctx: Arc::clone(&self.ctx),
                    node,
                    graphs: Arc::clone(&self.graphs),
                    statuses: Arc::clone(&self.statuses),
                }) as Box<dyn Worker<ProjectNode>>
            })
            .collect()
    }
}

impl ProjectRunner for ParallelProjectRunner {
    fn run_projects<'a>(
        &'a self,
        ctx: Arc<BuildContext>,
        requested: &'a [TaskId],
        projects: &'a [Project],
    ) -> RunnerFuture<'a> {
        Box::pin(async move {
            let nodes: HashMap<&str, ProjectNode> = projects
                .iter()
                .map(|p| (p.name.as_str(), ProjectNode(Arc::new(p.clone()))))
                .collect();

            let graph = DependencyGraph::new();
            for project in projects {
                let node = nodes[project.name.as_str()].clone();
                graph.add_node(node.clone());
                for dep in &project.depends_on {
                    if let Some(dep_node) = nodes.get(dep.as_str()) {
                        graph.add_edge(node.clone(), dep_node.clone());
                    }
                }
            }
            graph.ensure_acyclic()?;
            let graphs = build_project_graphs(&ctx, projects, requested)?;

            let statuses: Statuses = Arc::new(Mutex::new(Vec::new()));
            let factory = Arc::new(ProjectWorkerFactory {
                ctx: Arc::clone(&ctx),
                graphs: Arc::new(Mutex::new(graphs)),
                statuses: Arc::clone(&statuses),
            });

            let outcome = GraphScheduler::new(graph, factory, ctx.options().project_scheduler())
                .run()
                .await?;

            let mut statuses = std::mem::take(&mut *statuses.lock().unwrap_or_else(PoisonError::into_inner));
            let mut unsuccessful: HashSet<String> = statuses
                .iter()
                .filter(|(_, s)| *s != ProjectStatus::Success)
                .map(|(n, _)| n.clone())
                .collect();

            let ran: HashSet<String> = statuses.iter().map(|(n, _)| n.clone()).collect();
            let order = crate::runner::project_order(projects)?;
            for project in order.into_iter().filter(|p| !ran.contains(&p.name)) {
                let blocked: Vec<&str> = project
                    .depends_on
                    .iter()
                    .filter(|d| unsuccessful.contains(*d))
                    .map(String::as_str)
                    .collect();
                if blocked.is_empty() {
                    warn!(project = %project.name, "Not building project {}; build stopped after a failure", project.name);
                } else {
                    warn!(
                        project = %project.name,
                        "Not building project {} since it depends on failed project(s) {}",
                        project.name,
                        blocked.join(",")
                    );
                }
                unsuccessful.insert(project.name.clone());
                ctx.project_end(project, ProjectStatus::Skipped);
                statuses.push((project.name.clone(), ProjectStatus::Skipped));
            }

            Ok(RunTargetResult {
                result: outcome.result,
                statuses,
                messages: ctx.report().messages(),
                history: outcome.history,
            })
        })
    }
}
