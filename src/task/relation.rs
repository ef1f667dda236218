// src/task/relation.rs

//! Ordering relations between task *names*.
//!
//! Every relation is stored from the point of view of the task that
//! declares it: `relations.declare(RunAfter, "test", "compile")` reads
//! "test runs after compile". [`Relation::edge`] is the one place that turns
//! such a declaration into a graph edge.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    /// The task needs the other task; pulled in transitively.
    DependsOn,
    /// The task runs before the other one, when both were requested.
    RunBefore,
    /// The task runs after the other one, when both were requested.
    RunAfter,
    /// The task runs after the other one whenever either is in the graph.
    AlwaysRunAfter,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::DependsOn,
        Relation::RunBefore,
        Relation::RunAfter,
        Relation::AlwaysRunAfter,
    ];

    /// The edge for "`task` <self> `other`", as `(from, to)` where `from`
    /// depends on `to`.
    pub fn edge<'a>(self, task: &'a str, other: &'a str) -> (&'a str, &'a str) {
        match self {
            Relation::RunBefore => (other, task),
            Relation::DependsOn | Relation::RunAfter | Relation::AlwaysRunAfter => (task, other),
        }
    }

    /// Whether the relation applies to tasks discovered through dependencies,
    /// not only to the tasks that were explicitly requested.
    pub fn applies_transitively(self) -> bool {
        matches!(self, Relation::DependsOn | Relation::AlwaysRunAfter)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::DependsOn => "dependsOn",
            Relation::RunBefore => "runBefore",
            Relation::RunAfter => "runAfter",
            Relation::AlwaysRunAfter => "alwaysRunAfter",
        };
        f.write_str(s)
    }
}

type NameMap = BTreeMap<String, BTreeSet<String>>;

/// The multi-valued name -> names maps for every [`Relation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    maps: BTreeMap<Relation, NameMap>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record "`task` <relation> `other`".
    pub fn declare(
        &mut self,
        relation: Relation,
        task: impl Into<String>,
        other: impl Into<String>,
    ) -> &mut Self {
        self.maps
            .entry(relation)
            .or_default()
            .entry(task.into())
            .or_default()
            .insert(other.into());
        self
    }

    pub fn depends_on(&mut self, task: impl Into<String>, dependency: impl Into<String>) -> &mut Self {
        self.declare(Relation::DependsOn, task, dependency)
    }

    /// `task` must run before `dependent`, and `dependent` needs it: the same
    /// as `dependent` depending on `task`.
    pub fn reverse_depends_on(
        &mut self,
        task: impl Into<String>,
        dependent: impl Into<String>,
    ) -> &mut Self {
        self.declare(Relation::DependsOn, dependent, task)
    }

    pub fn run_before(&mut self, task: impl Into<String>, other: impl Into<String>) -> &mut Self {
        self.declare(Relation::RunBefore, task, other)
    }

    pub fn run_after(&mut self, task: impl Into<String>, other: impl Into<String>) -> &mut Self {
        self.declare(Relation::RunAfter, task, other)
    }

    pub fn always_run_after(&mut self, task: impl Into<String>, other: impl Into<String>) -> &mut Self {
        self.declare(Relation::AlwaysRunAfter, task, other)
    }

    /// Names `task` is related to under `relation`.
    pub fn targets<'a>(&'a self, relation: Relation, task: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.maps
            .get(&relation)
            .and_then(|m| m.get(task))
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// `other -> {task : task <relation> other}`.
    pub fn inverted(&self, relation: Relation) -> NameMap {
        let mut out = NameMap::new();
        if let Some(map) = self.maps.get(&relation) {
            for (task, others) in map {
                for other in others {
                    out.entry(other.clone()).or_default().insert(task.clone());
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.maps.values().all(|m| m.is_empty())
    }

    /// Every task name mentioned by any relation, on either side.
    pub fn names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for map in self.maps.values() {
            for (task, others) in map {
                out.insert(task.clone());
                out.extend(others.iter().cloned());
            }
        }
        out
    }
}
