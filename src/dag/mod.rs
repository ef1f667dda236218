// src/dag/mod.rs

//! Generic dependency graph and the concurrent scheduler that drains it.
//!
//! - [`graph`] holds the mutable "depends on" graph, its free-node
//!   computation and the cycle check.
//! - [`scheduler`] submits free nodes to a bounded worker pool and advances
//!   the graph as workers finish.
//!
//! Both are reused for tasks inside one project and for whole projects.

pub mod graph;
pub mod scheduler;

pub use graph::{DependencyGraph, transitive_closure};
pub use scheduler::{
    GraphScheduler, NodeResult, ScheduleOutcome, SchedulerOptions, Worker, WorkerFactory,
    WorkerFuture, WorkerSpan,
};
