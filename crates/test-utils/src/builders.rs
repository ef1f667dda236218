#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use buildgraph::config::BuildOptions;
use buildgraph::dag::DependencyGraph;
use buildgraph::task::{
    NodeMap, Plugin, Project, Relations, TaskGraphBuilder, TaskId, TaskResult, TaskSpec,
};

/// One node per name, keyed by that name.
pub fn node_map(names: &[&str]) -> NodeMap<String> {
    names
        .iter()
        .map(|n| (n.to_string(), vec![n.to_string()]))
        .collect()
}

/// Build a string graph for `project` with every name in `names` available.
pub fn build_graph(
    relations: &Relations,
    requested: &[&str],
    names: &[&str],
) -> DependencyGraph<String> {
    let ids: Vec<TaskId> = requested.iter().map(|r| TaskId::parse(r)).collect();
    TaskGraphBuilder::new(relations)
        .build("test", &ids, &node_map(names))
        .expect("graph should build")
}

/// Drain a graph without running anything: take every free node (sorted),
/// remove it, repeat. Returns the visiting order.
pub fn dry_run_order(graph: &DependencyGraph<String>) -> Vec<String> {
    let mut order = Vec::new();
    loop {
        let mut free: Vec<String> = graph.free_nodes().into_iter().collect();
        if free.is_empty() {
            break;
        }
        free.sort();
        for node in free {
            graph.remove_node(&node);
            order.push(node);
        }
    }
    assert!(graph.is_empty(), "graph has a cycle: {}", graph.dump());
    order
}

/// Shared list of `project:task` names appended to as tasks run.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries that belong to `project`, without the project prefix.
    pub fn for_project(&self, project: &str) -> Vec<String> {
        let prefix = format!("{project}:");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

/// A task that records `project:name` and succeeds.
pub fn recording_task(name: &str, recorder: &Recorder) -> TaskSpec {
    let recorder = recorder.clone();
    let task = name.to_string();
    TaskSpec::new(name, move |project: &Project| {
        recorder.record(format!("{}:{}", project.name, task));
        Ok(TaskResult::ok())
    })
}

/// A task that records `project:name` and fails in the listed projects.
pub fn failing_task(name: &str, recorder: &Recorder, failing_in: &[&str]) -> TaskSpec {
    let recorder = recorder.clone();
    let task = name.to_string();
    let failing: Vec<String> = failing_in.iter().map(|p| p.to_string()).collect();
    TaskSpec::new(name, move |project: &Project| {
        recorder.record(format!("{}:{}", project.name, task));
        if failing.contains(&project.name) {
            Ok(TaskResult::failure(format!("{} failed in {}", task, project.name)))
        } else {
            Ok(TaskResult::ok())
        }
    })
}

/// A plugin contributing a fixed set of task specs to the projects it accepts.
pub struct TestPlugin {
    name: String,
    tasks: Vec<TaskSpec>,
    only: Option<Vec<String>>,
}

impl TestPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasks: Vec::new(),
            only: None,
        }
    }

    pub fn with_task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    /// Restrict the plugin to the named projects.
    pub fn only(mut self, projects: &[&str]) -> Self {
        self.only = Some(projects.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn shared(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, project: &Project) -> bool {
        self.only
            .as_ref()
            .is_none_or(|only| only.contains(&project.name))
    }

    fn tasks(&self, _project: &Project) -> Vec<TaskSpec> {
        self.tasks.clone()
    }
}

/// Builder for `BuildOptions` with test-friendly defaults (fast polling).
pub struct BuildOptionsBuilder {
    options: BuildOptions,
}

impl BuildOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: BuildOptions {
                poll_interval_ms: 50,
                ..BuildOptions::default()
            },
        }
    }

    pub fn parallel(mut self, val: bool) -> Self {
        self.options.parallel = val;
        self
    }

    pub fn project_concurrency(mut self, n: usize) -> Self {
        self.options.project_concurrency = n;
        self
    }

    pub fn task_concurrency(mut self, n: usize) -> Self {
        self.options.task_concurrency = n;
        self
    }

    pub fn dry_run(mut self, val: bool) -> Self {
        self.options.dry_run = val;
        self
    }

    pub fn incremental(mut self, val: bool) -> Self {
        self.options.incremental = val;
        self
    }

    pub fn state_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.options.state_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn build(self) -> BuildOptions {
        self.options
    }
}

impl Default for BuildOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
