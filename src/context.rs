// src/context.rs

//! State shared by every worker of one build.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::config::BuildOptions;
use crate::incremental::{ChecksumStore, FileChecksumStore, IncrementalGate};
use crate::report::{BuildListener, BuildReport};
use crate::task::{InstalledTasks, Project, Task};
use crate::types::ProjectStatus;

pub struct BuildContext {
    options: BuildOptions,
    installed: InstalledTasks,
    gate: IncrementalGate,
    dirty_projects: Mutex<HashSet<String>>,
    report: Arc<BuildReport>,
    listeners: Vec<Arc<dyn BuildListener>>,
}

impl BuildContext {
    /// Context whose checksum store lives under `options.state_dir`.
    pub fn new(options: BuildOptions, installed: InstalledTasks) -> Self {
        let store = FileChecksumStore::new(&options.state_dir);
        Self::with_store(options, installed, Box::new(store))
    }

    pub fn with_store(
        options: BuildOptions,
        installed: InstalledTasks,
        store: Box<dyn ChecksumStore>,
    ) -> Self {
        let gate = IncrementalGate::new(store, options.incremental);
        Self {
            options,
            installed,
            gate,
            dirty_projects: Mutex::new(HashSet::new()),
            report: Arc::new(BuildReport::new()),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn BuildListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn installed(&self) -> &InstalledTasks {
        &self.installed
    }

    pub fn gate(&self) -> &IncrementalGate {
        &self.gate
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    fn dirty(&self) -> MutexGuard<'_, HashSet<String>> {
        self.dirty_projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `project` was rebuilt, so incremental tasks of projects
    /// depending on it must run.
    pub fn mark_dirty(&self, project: &str) {
        if self.dirty().insert(project.to_string()) {
            debug!(project, "project marked dirty");
        }
    }

    pub fn depends_on_dirty(&self, project: &Project) -> bool {
        let dirty = self.dirty();
        project.depends_on.iter().any(|d| dirty.contains(d))
    }

    fn each_listener(&self, mut f: impl FnMut(&dyn BuildListener)) {
        f(self.report.as_ref());
        for listener in &self.listeners {
            f(listener.as_ref());
        }
    }

    pub(crate) fn project_start(&self, project: &Project) {
        self.each_listener(|l| l.project_start(project));
    }

    pub(crate) fn project_end(&self, project: &Project, status: ProjectStatus) {
        self.each_listener(|l| l.project_end(project, status));
    }

    pub(crate) fn task_start(&self, task: &Task) {
        self.each_listener(|l| l.task_start(task));
    }

    pub(crate) fn task_end(&self, task: &Task, success: bool, elapsed: Duration) {
        self.each_listener(|l| l.task_end(task, success, elapsed));
    }
}
