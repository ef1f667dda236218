// src/incremental/gate.rs

//! Decides whether an incremental task can be skipped.
//!
//! A task is skipped only when all of these hold:
//! - incremental builds are enabled,
//! - no project it depends on was rebuilt in this run,
//! - it reports an input checksum equal to the stored one,
//! - its current output checksum equals the stored one.
//!
//! After a successful run the fresh checksums are written back; a failed run
//! leaves the stored record untouched.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::errors::Result;
use crate::incremental::store::{ChecksumStore, IncrementalRecord};
use crate::task::{Project, TaskResult};

pub type OutputChecksumFn = Box<dyn Fn() -> Option<String> + Send + Sync>;
pub type IncrementalWorkFn = Box<dyn FnOnce(&Project) -> anyhow::Result<TaskResult> + Send>;

/// What an incremental task reports before doing its work.
pub struct IncrementalTaskInfo {
    /// `None` means the task cannot tell, so it always runs.
    pub input_checksum: Option<String>,
    /// Current checksum of the task's outputs, `None` when they are absent.
    /// Called before the work (to compare) and after it (to record).
    pub output_checksum: OutputChecksumFn,
    pub work: IncrementalWorkFn,
}

impl IncrementalTaskInfo {
    pub fn new<O, W>(input_checksum: Option<String>, output_checksum: O, work: W) -> Self
    where
        O: Fn() -> Option<String> + Send + Sync + 'static,
        W: FnOnce(&Project) -> anyhow::Result<TaskResult> + Send + 'static,
    {
        Self {
            input_checksum,
            output_checksum: Box::new(output_checksum),
            work: Box::new(work),
        }
    }
}

impl fmt::Debug for IncrementalTaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalTaskInfo")
            .field("input_checksum", &self.input_checksum)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    UpToDate,
    Disabled,
    UpstreamDirty,
    NoInputChecksum,
    NoRecord,
    InputChanged,
    OutputChanged,
}

impl GateDecision {
    pub fn must_run(self) -> bool {
        self != GateDecision::UpToDate
    }

    /// Whether running for this reason makes the owning project dirty for
    /// the projects that depend on it.
    pub fn marks_dirty(self) -> bool {
        matches!(self, GateDecision::InputChanged | GateDecision::UpstreamDirty)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateDecision::UpToDate => "up to date",
            GateDecision::Disabled => "incremental builds disabled",
            GateDecision::UpstreamDirty => "a dependent project was rebuilt",
            GateDecision::NoInputChecksum => "no input checksum",
            GateDecision::NoRecord => "no previous run recorded",
            GateDecision::InputChanged => "input checksum changed",
            GateDecision::OutputChanged => "output checksum changed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub result: TaskResult,
}

/// The checksum store plus the global on/off switch.
pub struct IncrementalGate {
    store: Mutex<Box<dyn ChecksumStore>>,
    enabled: bool,
}

impl IncrementalGate {
    pub fn new(store: Box<dyn ChecksumStore>, enabled: bool) -> Self {
        Self {
            store: Mutex::new(store),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn ChecksumStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, key: &str) -> Result<Option<IncrementalRecord>> {
        Ok(self.store().load(key)?)
    }

    pub fn records(&self) -> Result<Vec<IncrementalRecord>> {
        Ok(self.store().records()?)
    }

    pub fn decide(
        &self,
        key: &str,
        info: &IncrementalTaskInfo,
        upstream_dirty: bool,
    ) -> Result<GateDecision> {
        if !self.enabled {
            return Ok(GateDecision::Disabled);
        }
        if upstream_dirty {
            return Ok(GateDecision::UpstreamDirty);
        }
        let Some(input) = info.input_checksum.as_deref() else {
            return Ok(GateDecision::NoInputChecksum);
        };
        let Some(record) = self.store().load(key)? else {
            return Ok(GateDecision::NoRecord);
        };
        if record.input_checksum.as_deref() != Some(input) {
            debug!(
                task = key,
                stored = record.input_checksum.as_deref().unwrap_or("-"),
                current = input,
                "input checksum changed"
            );
            return Ok(GateDecision::InputChanged);
        }

        let output = (info.output_checksum)();
        match (record.output_checksum.as_deref(), output.as_deref()) {
            (Some(stored), Some(current)) if stored == current => Ok(GateDecision::UpToDate),
            (stored, current) => {
                debug!(
                    task = key,
                    stored = stored.unwrap_or("-"),
                    current = current.unwrap_or("-"),
                    "output checksum changed"
                );
                Ok(GateDecision::OutputChanged)
            }
        }
    }

    /// Run `info.work` unless the task is up to date, and record fresh
    /// checksums after a successful run.
    pub fn run(
        &self,
        key: &str,
        project: &Project,
        info: IncrementalTaskInfo,
        upstream_dirty: bool,
    ) -> Result<GateOutcome> {
        let decision = self.decide(key, &info, upstream_dirty)?;
        if !decision.must_run() {
            debug!(task = key, "skipping incremental task; up to date");
            return Ok(GateOutcome {
                decision,
                result: TaskResult::ok(),
            });
        }

        debug!(task = key, reason = %decision, "running incremental task");
        let IncrementalTaskInfo {
            input_checksum,
            output_checksum,
            work,
        } = info;
        let result = work(project)?;

        if result.success {
            let record = IncrementalRecord {
                task_name: key.to_string(),
                input_checksum,
                output_checksum: output_checksum(),
            };
            self.store().save(record)?;
        }

        Ok(GateOutcome { decision, result })
    }
}
