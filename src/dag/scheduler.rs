// src/dag/scheduler.rs

//! Drains a [`DependencyGraph`] through a bounded pool of workers.
//!
//! The loop is:
//! 1. submit every free node (as workers built by a [`WorkerFactory`]),
//! 2. wait for the next finished worker, with a bounded liveness poll,
//! 3. on success remove the node from the graph and submit whatever became
//!    free; on failure remember the first failure and stop submitting,
//! 4. repeat while work is running or free nodes remain.
//!
//! Work that was already submitted is never cancelled: after a failure the
//! scheduler only waits for in-flight workers to drain. A worker that returns
//! an error (or panics) instead of a structured [`TaskResult`] aborts the
//! whole run.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::errors::{BuildError, Result};
use crate::logging::LogBuffer;
use crate::task::TaskResult;

/// Default wait for a completion before logging and polling again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What a worker hands back for the node it ran.
#[derive(Debug)]
pub struct NodeResult<T> {
    pub node: T,
    pub result: TaskResult,
    /// Lines flushed by the scheduler when this result is committed.
    pub log: LogBuffer,
}

impl<T> NodeResult<T> {
    pub fn new(node: T, result: TaskResult) -> Self {
        Self {
            node,
            result,
            log: LogBuffer::default(),
        }
    }

    pub fn with_log(mut self, log: LogBuffer) -> Self {
        self.log = log;
        self
    }
}

pub type WorkerFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<NodeResult<T>>> + Send>>;

/// One runnable unit of work for a graph node.
pub trait Worker<T>: Send {
    /// Name used in logs and in the worker history.
    fn name(&self) -> String;

    /// Run the work. `Err` means an unexpected failure that aborts the run;
    /// an ordinary failure is `Ok` with an unsuccessful [`TaskResult`].
    fn call(self: Box<Self>) -> WorkerFuture<T>;
}

/// Turns a batch of free nodes into workers.
///
/// Must return exactly one worker per node, and each worker must report
/// its own node back in its [`NodeResult`].
pub trait WorkerFactory<T>: Send + Sync {
    fn create_workers(&self, nodes: Vec<T>) -> Vec<Box<dyn Worker<T>>>;
}

/// Start/end of one worker, relative to the start of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpan {
    pub name: String,
    pub started: Duration,
    pub finished: Duration,
}

impl WorkerSpan {
    pub fn duration(&self) -> Duration {
        self.finished.saturating_sub(self.started)
    }
}

/// Result of draining a graph.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// The first failure observed, or a generic success.
    pub result: TaskResult,
    /// Every worker that ran, in completion order.
    pub history: Vec<WorkerSpan>,
}

impl ScheduleOutcome {
    /// Wall-clock time the workers would have taken back to back.
    pub fn sequential_time(&self) -> Duration {
        self.history.iter().map(WorkerSpan::duration).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Maximum number of workers executing at the same time.
    pub concurrency: usize,
    /// Bounded wait on the completion queue before polling again.
    pub poll_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Completion<T> {
    name: String,
    span: WorkerSpan,
    outcome: anyhow::Result<NodeResult<T>>,
}

pub struct GraphScheduler<T> {
    graph: DependencyGraph<T>,
    factory: Arc<dyn WorkerFactory<T>>,
    options: SchedulerOptions,
}

impl<T> GraphScheduler<T>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    pub fn new(
        graph: DependencyGraph<T>,
        factory: Arc<dyn WorkerFactory<T>>,
        options: SchedulerOptions,
    ) -> Self {
        let options = SchedulerOptions {
            concurrency: options.concurrency.max(1),
            ..options
        };
        Self {
            graph,
            factory,
            options,
        }
    }

    pub fn graph(&self) -> &DependencyGraph<T> {
        &self.graph
    }

    /// Run every node of the graph to completion (or first failure).
    pub async fn run(self) -> Result<ScheduleOutcome> {
        let start = Instant::now();
        let pool = Arc::new(Semaphore::new(self.options.concurrency));
        let mut history: Vec<WorkerSpan> = Vec::new();
        let mut in_flight: JoinSet<Completion<T>> = JoinSet::new();

        let mut running = 0usize;
        let mut nodes_run: HashSet<T> = HashSet::new();
        let mut failed: Option<TaskResult> = None;
        let mut new_free: Vec<T> = self.graph.free_nodes().into_iter().collect();

        debug!(
            nodes = self.graph.len(),
            free = new_free.len(),
            concurrency = self.options.concurrency,
            "graph scheduler starting"
        );

        while running > 0 || (failed.is_none() && !new_free.is_empty()) {
            if failed.is_none() && !new_free.is_empty() {
                nodes_run.extend(new_free.iter().cloned());
                let workers = self.factory.create_workers(std::mem::take(&mut new_free));

                for worker in workers {
                    running += 1;
                    let pool = Arc::clone(&pool);
                    in_flight.spawn(async move {
                        let name = worker.name();
                        let _permit = pool.acquire_owned().await;
                        let started = start.elapsed();
                        debug!(worker = %name, "worker started");
                        let outcome = worker.call().await;
                        let finished = start.elapsed();
                        Completion {
                            span: WorkerSpan {
                                name: name.clone(),
                                started,
                                finished,
                            },
                            name,
                            outcome,
                        }
                    });
                }
            }

            if running == 0 {
                break;
            }

            let joined =
                match tokio::time::timeout(self.options.poll_interval, in_flight.join_next()).await {
                    Err(_elapsed) => {
                        debug!(running, "timed out waiting for a worker; polling again");
                        continue;
                    }
                    Ok(None) => {
                        return Err(BuildError::WorkerFatal {
                            worker: "<scheduler>".to_string(),
                            message: format!("{running} worker(s) lost from the completion queue"),
                        });
                    }
                    Ok(Some(joined)) => joined,
                };

            running -= 1;

            let completion = joined.map_err(|e| BuildError::WorkerFatal {
                worker: "<unknown>".to_string(),
                message: format!("worker task panicked or was cancelled: {e}"),
            })?;

            history.push(completion.span);

            let node_result = completion.outcome.map_err(|e| BuildError::WorkerFatal {
                worker: completion.name.clone(),
                message: format!("{e:#}"),
            })?;

            // Commit point: this unit's log lines go out together.
            node_result.log.flush();

            if node_result.result.success {
                debug!(worker = %completion.name, node = %node_result.node, "worker succeeded");
                self.graph.remove_node(&node_result.node);
                if failed.is_none() {
                    new_free = self
                        .graph
                        .free_nodes()
                        .into_iter()
                        .filter(|n| !nodes_run.contains(n))
                        .collect();
                }
            } else {
                warn!(
                    worker = %completion.name,
                    node = %node_result.node,
                    error = node_result.result.error_message.as_deref().unwrap_or(""),
                    "worker failed; no new work will be scheduled"
                );
                new_free.clear();
                if failed.is_none() {
                    failed = Some(node_result.result);
                }
            }
        }

        // Every success removes its node, so a clean run leaves nothing
        // behind. Leftovers mean some node could never become free.
        if failed.is_none() && !self.graph.is_empty() {
            let mut remaining: Vec<String> =
                self.graph.nodes().iter().map(|n| n.to_string()).collect();
            remaining.sort();
            return Err(BuildError::Stalled { remaining });
        }

        let result = failed.unwrap_or_else(TaskResult::ok);
        info!(
            success = result.success,
            workers = history.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "graph scheduler finished"
        );

        Ok(ScheduleOutcome { result, history })
    }
}
