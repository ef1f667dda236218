// src/incremental/mod.rs

//! Incremental builds: checksum persistence and the skip decision.

pub mod checksum;
pub mod gate;
pub mod store;

pub use checksum::{compute_aggregate_hash, compute_file_hash, compute_hash_for_paths};
pub use gate::{GateDecision, GateOutcome, IncrementalGate, IncrementalTaskInfo};
pub use store::{
    BUILD_INFO_FILE, ChecksumStore, FileChecksumStore, IncrementalRecord, MemoryChecksumStore,
};
