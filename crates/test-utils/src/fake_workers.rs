use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use buildgraph::dag::{NodeResult, Worker, WorkerFactory, WorkerFuture};
use buildgraph::task::TaskResult;

struct Shared<T> {
    ran: Mutex<Vec<T>>,
    failing: HashSet<T>,
    fatal: HashSet<T>,
    panicking: HashSet<T>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// A fake worker factory that:
/// - records which nodes were run, in completion order
/// - fails (structured) the nodes listed in `failing`
/// - returns an `Err` (fatal) for the nodes listed in `fatal`
/// - panics on the nodes listed in `panicking`
/// - tracks the highest number of workers running at once.
pub struct RecordingFactory<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for RecordingFactory<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> RecordingFactory<T>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::build(HashSet::new(), HashSet::new(), HashSet::new(), Duration::ZERO)
    }

    fn build(failing: HashSet<T>, fatal: HashSet<T>, panicking: HashSet<T>, delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                ran: Mutex::new(Vec::new()),
                failing,
                fatal,
                panicking,
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Start over with the given failing nodes. Call before handing the
    /// factory to a scheduler.
    pub fn failing(self, nodes: impl IntoIterator<Item = T>) -> Self {
        Self::build(
            nodes.into_iter().collect(),
            self.shared.fatal.clone(),
            self.shared.panicking.clone(),
            self.shared.delay,
        )
    }

    pub fn fatal(self, nodes: impl IntoIterator<Item = T>) -> Self {
        Self::build(
            self.shared.failing.clone(),
            nodes.into_iter().collect(),
            self.shared.panicking.clone(),
            self.shared.delay,
        )
    }

    pub fn panicking(self, nodes: impl IntoIterator<Item = T>) -> Self {
        Self::build(
            self.shared.failing.clone(),
            self.shared.fatal.clone(),
            nodes.into_iter().collect(),
            self.shared.delay,
        )
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        Self::build(
            self.shared.failing.clone(),
            self.shared.fatal.clone(),
            self.shared.panicking.clone(),
            delay,
        )
    }

    pub fn ran(&self) -> Vec<T> {
        self.shared.ran.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn as_factory(&self) -> Arc<dyn WorkerFactory<T>> {
        Arc::new(self.clone())
    }
}

impl<T> Default for RecordingFactory<T>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkerFactory<T> for RecordingFactory<T>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    fn create_workers(&self, nodes: Vec<T>) -> Vec<Box<dyn Worker<T>>> {
        nodes
            .into_iter()
            .map(|node| {
                Box::new(RecordingWorker {
                    node,
                    shared: Arc::clone(&self.shared),
                }) as Box<dyn Worker<T>>
            })
            .collect()
    }
}

struct RecordingWorker<T> {
    node: T,
    shared: Arc<Shared<T>>,
}

impl<T> Worker<T> for RecordingWorker<T>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    fn name(&self) -> String {
        self.node.to_string()
    }

    fn call(self: Box<Self>) -> WorkerFuture<T> {
        Box::pin(async move {
            let RecordingWorker { node, shared } = *self;

            let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if shared.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(shared.delay).await;
            }

            shared.ran.lock().unwrap().push(node.clone());
            shared.in_flight.fetch_sub(1, Ordering::SeqCst);

            if shared.fatal.contains(&node) {
                return Err(anyhow!("worker for {node} blew up"));
            }
            if shared.panicking.contains(&node) {
                panic!("worker for {node} panicked");
            }
            let result = if shared.failing.contains(&node) {
                TaskResult::failure(format!("{node} failed"))
            } else {
                TaskResult::ok()
            };
            Ok(NodeResult::new(node, result))
        })
    }
}
