// src/task/mod.rs

//! Task model: projects, tasks, relations and per-project graph building.

pub mod builder;
pub mod model;
pub mod registry;
pub mod relation;

pub use builder::{NodeMap, TaskGraphBuilder};
pub use model::{IncrementalTaskFn, Project, Task, TaskBody, TaskFn, TaskId, TaskResult};
pub use registry::{InstalledTasks, Plugin, TaskRegistry, TaskSpec};
pub use relation::{Relation, Relations};
