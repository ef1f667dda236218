// src/dag/graph.rs

//! A mutable "depends on" graph over opaque work items.
//!
//! An edge `from -> to` records that `from` depends on `to`: `to` must finish
//! before `from` may start. A node is *free* when it has no outstanding
//! dependency left. Removing a finished node drops it from every other
//! node's dependency set, which is how dependents become free.
//!
//! All node/edge state sits behind a single lock, so the graph can be shared
//! between the coordinating scheduler loop and readers of [`free_nodes`].
//!
//! [`free_nodes`]: DependencyGraph::free_nodes

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Write as _};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::errors::{BuildError, Result};

#[derive(Debug)]
struct Inner<T> {
    nodes: HashSet<T>,
    /// node -> nodes it still waits for.
    depends_on: HashMap<T, HashSet<T>>,
    /// node -> nodes waiting for it.
    dependents: HashMap<T, HashSet<T>>,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Self {
            nodes: HashSet::new(),
            depends_on: HashMap::new(),
            dependents: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct DependencyGraph<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl<T> DependencyGraph<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a node with no edges. Adding an existing node is a no-op.
    pub fn add_node(&self, node: T) {
        self.lock().nodes.insert(node);
    }

    /// Make `from` depend on `to` (`from` is no longer free until `to` is
    /// removed). Both endpoints are added as nodes if absent.
    pub fn add_edge(&self, from: T, to: T) {
        let mut inner = self.lock();
        inner.nodes.insert(from.clone());
        inner.nodes.insert(to.clone());
        inner
            .dependents
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
        inner.depends_on.entry(from).or_default().insert(to);
    }

    /// Delete `node` and drop it from the dependency set of every node that
    /// was waiting for it.
    pub fn remove_node(&self, node: &T) {
        let mut inner = self.lock();
        inner.nodes.remove(node);

        if let Some(deps) = inner.depends_on.remove(node) {
            for dep in deps {
                if let Some(waiting) = inner.dependents.get_mut(&dep) {
                    waiting.remove(node);
                }
            }
        }

        if let Some(waiting) = inner.dependents.remove(node) {
            for dependent in waiting {
                if let Some(deps) = inner.depends_on.get_mut(&dependent) {
                    deps.remove(node);
                }
            }
        }
    }

    /// All nodes minus any node that still has an outstanding dependency.
    pub fn free_nodes(&self) -> HashSet<T> {
        let inner = self.lock();
        inner
            .nodes
            .iter()
            .filter(|n| inner.depends_on.get(*n).is_none_or(|deps| deps.is_empty()))
            .cloned()
            .collect()
    }

    /// Direct dependencies of `node` that have not been removed yet.
    pub fn children_of(&self, node: &T) -> Vec<T> {
        self.lock()
            .depends_on
            .get(node)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `root` followed by everything it (transitively) depends on.
    pub fn transitive_closure(&self, root: T) -> Vec<T> {
        transitive_closure(root, |n| self.children_of(n))
    }

    pub fn contains(&self, node: &T) -> bool {
        self.lock().nodes.contains(node)
    }

    /// Snapshot of every node currently in the graph.
    pub fn nodes(&self) -> Vec<T> {
        self.lock().nodes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }
}

impl<T> DependencyGraph<T>
where
    T: Clone + Eq + Hash + Display,
{
    /// Three-colour DFS over the "depends on" edges.
    ///
    /// Returns the first cycle found, as node names in edge order with the
    /// starting node repeated at the end (e.g. `["a", "b", "a"]`).
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let inner = self.lock();

        // Deterministic traversal order makes the reported cycle stable.
        let mut roots: Vec<&T> = inner.nodes.iter().collect();
        roots.sort_by_cached_key(|n| n.to_string());

        let mut color: HashMap<&T, Color> = roots.iter().map(|n| (*n, Color::White)).collect();
        let empty = HashSet::new();
        let children = |n: &T| -> Vec<&T> {
            let mut c: Vec<&T> = inner.depends_on.get(n).unwrap_or(&empty).iter().collect();
            c.sort_by_cached_key(|n| n.to_string());
            c
        };

        for root in roots {
            if color.get(root) != Some(&Color::White) {
                continue;
            }

            // Explicit stack of (node, remaining children) keeps deep graphs
            // off the call stack.
            let mut path: Vec<&T> = vec![root];
            let mut stack: Vec<std::vec::IntoIter<&T>> = vec![children(root).into_iter()];
            color.insert(root, Color::Gray);

            while let Some(iter) = stack.last_mut() {
                match iter.next() {
                    Some(child) => match color.get(child).copied().unwrap_or(Color::White) {
                        Color::White => {
                            color.insert(child, Color::Gray);
                            path.push(child);
                            stack.push(children(child).into_iter());
                        }
                        Color::Gray => {
                            let start = path.iter().position(|n| *n == child).unwrap_or(0);
                            let mut cycle: Vec<String> =
                                path[start..].iter().map(|n| n.to_string()).collect();
                            cycle.push(child.to_string());
                            return Some(cycle);
                        }
                        Color::Black => {}
                    },
                    None => {
                        stack.pop();
                        if let Some(done) = path.pop() {
                            color.insert(done, Color::Black);
                        }
                    }
                }
            }
        }

        None
    }

    /// Fail fast with the offending cycle instead of letting the scheduler
    /// spin on a graph that can never free its remaining nodes.
    pub fn ensure_acyclic(&self) -> Result<()> {
        match self.find_cycle() {
            Some(nodes) => Err(BuildError::Cycle { nodes }),
            None => Ok(()),
        }
    }

    /// Human-readable snapshot for debug logging.
    pub fn dump(&self) -> String {
        let inner = self.lock();
        let mut all: Vec<String> = inner.nodes.iter().map(|n| n.to_string()).collect();
        all.sort();

        let mut free: Vec<String> = inner
            .nodes
            .iter()
            .filter(|n| inner.depends_on.get(*n).is_none_or(|d| d.is_empty()))
            .map(|n| n.to_string())
            .collect();
        free.sort();

        let mut out = String::new();
        let _ = writeln!(out, "all nodes: [{}]", all.join(", "));
        let _ = writeln!(out, "free nodes: [{}]", free.join(", "));

        let mut dependent: Vec<(String, Vec<String>)> = inner
            .depends_on
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(n, deps)| {
                let mut d: Vec<String> = deps.iter().map(|x| x.to_string()).collect();
                d.sort();
                (n.to_string(), d)
            })
            .collect();
        dependent.sort();
        for (node, deps) in dependent {
            let _ = writeln!(out, "  {node} -> [{}]", deps.join(", "));
        }
        trace!(nodes = all.len(), "dumped dependency graph");
        out
    }
}

impl<T> fmt::Display for DependencyGraph<T>
where
    T: Clone + Eq + Hash + Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

/// Breadth-first closure of `root` under `children`, each node once, in
/// discovery order.
pub fn transitive_closure<T, F>(root: T, mut children: F) -> Vec<T>
where
    T: Clone + Eq + Hash,
    F: FnMut(&T) -> Vec<T>,
{
    let mut result = Vec::new();
    let mut seen: HashSet<T> = HashSet::new();
    let mut to_process = vec![root];

    while !to_process.is_empty() {
        let mut next = Vec::new();
        for node in to_process.drain(..) {
            if seen.insert(node.clone()) {
                next.extend(children(&node));
                result.push(node);
            }
        }
        to_process = next;
    }

    result
}
