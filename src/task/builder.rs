// src/task/builder.rs

//! Builds the per-project task graph from requested names and relations.
//!
//! Resolution works on *names* and processes a frontier of names at a time:
//! every name in the frontier adds its instances as nodes, its transitive
//! relations (`dependsOn`, `alwaysRunAfter`) as edges, and queues the names
//! those relations reach. `runBefore` / `runAfter` are only honoured between
//! two names that were both requested and never pull a task in.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;

use tracing::{debug, trace};

use crate::dag::DependencyGraph;
use crate::errors::{BuildError, Result};
use crate::task::model::TaskId;
use crate::task::relation::{Relation, Relations};

/// Task name -> the concrete instances carrying that name.
pub type NodeMap<T> = BTreeMap<String, Vec<T>>;

pub struct TaskGraphBuilder<'a> {
    relations: &'a Relations,
    always_run_after_inverse: BTreeMap<String, BTreeSet<String>>,
    known_tasks: Option<&'a BTreeSet<String>>,
}

impl<'a> TaskGraphBuilder<'a> {
    pub fn new(relations: &'a Relations) -> Self {
        Self {
            always_run_after_inverse: relations.inverted(Relation::AlwaysRunAfter),
            relations,
            known_tasks: None,
        }
    }

    /// Names known anywhere in the build. A requested name missing from the
    /// current project but present here is skipped instead of rejected.
    pub fn with_known_tasks(mut self, known: &'a BTreeSet<String>) -> Self {
        self.known_tasks = Some(known);
        self
    }

    pub fn build<T>(
        &self,
        project: &str,
        requested: &[TaskId],
        nodes: &NodeMap<T>,
    ) -> Result<DependencyGraph<T>>
    where
        T: Clone + Eq + Hash,
    {
        let mut requested_names = BTreeSet::new();
        for id in requested.iter().filter(|id| id.matches(project)) {
            let known = match self.known_tasks {
                Some(known) => known.contains(id.task()),
                None => nodes.contains_key(id.task()),
            };
            if !known {
                return Err(BuildError::UnknownTask(id.to_string()));
            }
            requested_names.insert(id.task().to_string());
        }

        let graph = DependencyGraph::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut frontier = requested_names.clone();

        while !frontier.is_empty() {
            debug!(project, frontier = ?frontier, "resolving task names");
            let mut next = BTreeSet::new();

            for name in &frontier {
                seen.insert(name.clone());

                let Some(instances) = nodes.get(name) else {
                    debug!(project, task = %name, "no task with this name in project; skipping");
                    continue;
                };
                for node in instances {
                    graph.add_node(node.clone());
                }

                if let Some(followers) = self.always_run_after_inverse.get(name) {
                    for follower in followers {
                        if add_edges(&graph, project, Relation::AlwaysRunAfter, follower, name, nodes) {
                            next.insert(follower.clone());
                        }
                    }
                }

                for relation in Relation::ALL.into_iter().filter(|r| r.applies_transitively()) {
                    for other in self.relations.targets(relation, name) {
                        if add_edges(&graph, project, relation, name, other, nodes) {
                            next.insert(other.to_string());
                        }
                    }
                }

                if requested_names.contains(name) {
                    let ordering = Relation::ALL.into_iter().filter(|r| !r.applies_transitively());
                    for relation in ordering {
                        for other in self.relations.targets(relation, name) {
                            if requested_names.contains(other) {
                                add_edges(&graph, project, relation, name, other, nodes);
                            } else {
                                trace!(
                                    project,
                                    task = %name,
                                    %relation,
                                    other,
                                    "ordering ignored; other task was not requested"
                                );
                            }
                        }
                    }
                }
            }

            frontier = next.difference(&seen).cloned().collect();
        }

        Ok(graph)
    }
}

/// Add every instance edge for "`task` <relation> `other`". Returns false
/// when either side has no instance in this project.
fn add_edges<T>(
    graph: &DependencyGraph<T>,
    project: &str,
    relation: Relation,
    task: &str,
    other: &str,
    nodes: &NodeMap<T>,
) -> bool
where
    T: Clone + Eq + Hash,
{
    let (from, to) = relation.edge(task, other);
    let (Some(froms), Some(tos)) = (nodes.get(from), nodes.get(to)) else {
        debug!(project, task, %relation, other, "relation names a task missing from project; skipping");
        return false;
    };
    for f in froms {
        for t in tos {
            graph.add_edge(f.clone(), t.clone());
        }
    }
    trace!(project, from, to, %relation, "added edge");
    true
}
