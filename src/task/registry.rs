// src/task/registry.rs

//! Plugins contribute task specs; the registry binds them to projects.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::incremental::IncrementalTaskInfo;
use crate::task::builder::NodeMap;
use crate::task::model::{Project, Task, TaskBody, TaskId, TaskResult};
use crate::task::relation::{Relation, Relations};

/// A source of tasks. `tasks` is asked once per accepted project.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn accepts(&self, _project: &Project) -> bool {
        true
    }

    fn tasks(&self, project: &Project) -> Vec<TaskSpec>;
}

/// Declaration of one task: its body plus the relations it declares.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub group: String,
    pub body: TaskBody,
    relations: Vec<(Relation, String)>,
    reverse_depends_on: Vec<String>,
}

impl TaskSpec {
    fn with_body(name: impl Into<String>, body: TaskBody) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            group: "other".to_string(),
            body,
            relations: Vec::new(),
            reverse_depends_on: Vec::new(),
        }
    }

    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Project) -> anyhow::Result<TaskResult> + Send + Sync + 'static,
    {
        Self::with_body(name, TaskBody::Plain(Arc::new(body)))
    }

    pub fn incremental<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Project) -> anyhow::Result<IncrementalTaskInfo> + Send + Sync + 'static,
    {
        Self::with_body(name, TaskBody::Incremental(Arc::new(body)))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn depends_on(mut self, other: impl Into<String>) -> Self {
        self.relations.push((Relation::DependsOn, other.into()));
        self
    }

    pub fn reverse_depends_on(mut self, other: impl Into<String>) -> Self {
        self.reverse_depends_on.push(other.into());
        self
    }

    pub fn run_before(mut self, other: impl Into<String>) -> Self {
        self.relations.push((Relation::RunBefore, other.into()));
        self
    }

    pub fn run_after(mut self, other: impl Into<String>) -> Self {
        self.relations.push((Relation::RunAfter, other.into()));
        self
    }

    pub fn always_run_after(mut self, other: impl Into<String>) -> Self {
        self.relations.push((Relation::AlwaysRunAfter, other.into()));
        self
    }

    fn declare_into(&self, relations: &mut Relations) {
        for (relation, other) in &self.relations {
            relations.declare(*relation, self.name.clone(), other.clone());
        }
        for dependent in &self.reverse_depends_on {
            relations.reverse_depends_on(self.name.clone(), dependent.clone());
        }
    }
}

/// Plugins plus dynamically added tasks, before they are bound to projects.
#[derive(Default)]
pub struct TaskRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    dynamic: Vec<(String, String, TaskSpec)>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        debug!(plugin = plugin.name(), "registered plugin");
        self.plugins.push(plugin);
        self
    }

    /// Add a task to a single project outside of any plugin's `tasks`.
    pub fn add_task(
        &mut self,
        plugin: impl Into<String>,
        project: impl Into<String>,
        spec: TaskSpec,
    ) -> &mut Self {
        self.dynamic.push((plugin.into(), project.into(), spec));
        self
    }

    /// Bind every plugin's tasks to the projects it accepts.
    pub fn install(&self, projects: &[Project]) -> InstalledTasks {
        let mut installed = InstalledTasks {
            tasks: Vec::new(),
            relations: Relations::new(),
        };

        for project in projects {
            let shared = Arc::new(project.clone());
            for plugin in &self.plugins {
                if !plugin.accepts(project) {
                    trace!(plugin = plugin.name(), project = %project.name, "plugin does not apply");
                    continue;
                }
                for spec in plugin.tasks(project) {
                    installed.push(plugin.name(), &shared, spec);
                }
            }
            for (plugin, target, spec) in &self.dynamic {
                if *target == project.name {
                    installed.push(plugin, &shared, spec.clone());
                }
            }
        }

        debug!(
            tasks = installed.tasks.len(),
            projects = projects.len(),
            "installed plugin tasks"
        );
        installed
    }
}

/// Task instances for a concrete set of projects.
#[derive(Debug, Clone, Default)]
pub struct InstalledTasks {
    tasks: Vec<Arc<Task>>,
    relations: Relations,
}

impl InstalledTasks {
    fn push(&mut self, plugin: &str, project: &Arc<Project>, spec: TaskSpec) {
        spec.declare_into(&mut self.relations);
        let task = Task {
            plugin: plugin.to_string(),
            name: spec.name,
            description: spec.description,
            group: spec.group,
            project: Arc::clone(project),
            body: spec.body,
        };
        trace!(task = %task, plugin, "installed task");
        self.tasks.push(Arc::new(task));
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Task name -> every instance of it in `project`.
    pub fn tasks_by_name(&self, project: &str) -> NodeMap<Arc<Task>> {
        let mut map = NodeMap::new();
        for task in self.tasks.iter().filter(|t| t.project.name == project) {
            map.entry(task.name.clone())
                .or_insert_with(Vec::new)
                .push(Arc::clone(task));
        }
        map
    }

    /// Every task name known in any project.
    pub fn task_names(&self) -> BTreeSet<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }

    /// Whether any task matches `id` (any project when unqualified).
    pub fn has_task(&self, id: &TaskId) -> bool {
        self.tasks
            .iter()
            .any(|t| t.name == id.task() && id.matches(&t.project.name))
    }
}
