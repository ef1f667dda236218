// src/task/model.rs

//! Projects, tasks and their results.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use crate::incremental::IncrementalTaskInfo;

/// A buildable unit with its own task set. Projects may depend on other
/// projects by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Project {
    pub name: String,
    pub directory: PathBuf,
    pub depends_on: Vec<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            directory: PathBuf::from(&name),
            name,
            depends_on: Vec::new(),
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn depends_on(mut self, project: impl Into<String>) -> Self {
        self.depends_on.push(project.into());
        self
    }
}

/// Terminal, immutable outcome of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub success: bool,
    pub error_message: Option<String>,
}

impl TaskResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

impl Default for TaskResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// A requested task: `"compile"` (every project that has it) or
/// `"core:compile"` (only project `core`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    project: Option<String>,
    task: String,
}

impl TaskId {
    pub fn new(project: Option<&str>, task: impl Into<String>) -> Self {
        Self {
            project: project.map(str::to_string),
            task: task.into(),
        }
    }

    pub fn parse(id: &str) -> Self {
        match id.split_once(':') {
            Some((project, task)) => Self::new(Some(project), task),
            None => Self::new(None, id),
        }
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// True when unqualified or qualified with this project.
    pub fn matches(&self, project: &str) -> bool {
        self.project.as_deref().is_none_or(|p| p == project)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::parse(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{project}:{}", self.task),
            None => f.write_str(&self.task),
        }
    }
}

pub type TaskFn = Arc<dyn Fn(&Project) -> anyhow::Result<TaskResult> + Send + Sync>;
pub type IncrementalTaskFn =
    Arc<dyn Fn(&Project) -> anyhow::Result<IncrementalTaskInfo> + Send + Sync>;

/// How a task does its work.
#[derive(Clone)]
pub enum TaskBody {
    /// Always runs.
    Plain(TaskFn),
    /// Produces an [`IncrementalTaskInfo`] that the incremental gate
    /// evaluates before deciding whether the real work runs.
    Incremental(IncrementalTaskFn),
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Plain(_) => f.write_str("TaskBody::Plain"),
            TaskBody::Incremental(_) => f.write_str("TaskBody::Incremental"),
        }
    }
}

/// A concrete task instance: one plugin's task of a given name, bound to
/// one project. Several plugins may contribute tasks with the same name.
#[derive(Debug, Clone)]
pub struct Task {
    pub plugin: String,
    pub name: String,
    pub description: String,
    pub group: String,
    pub project: Arc<Project>,
    pub body: TaskBody,
}

impl Task {
    /// Project-qualified name, also used as the incremental store key.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.project.name, self.name)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.project.name == other.project.name
            && self.plugin == other.plugin
            && self.name == other.name
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.project.name.hash(state);
        self.plugin.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project.name, self.name)
    }
}
