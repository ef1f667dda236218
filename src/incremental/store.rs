// src/incremental/store.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::{FileSystem, RealFileSystem};

/// File name of the checksum store inside the state directory.
pub const BUILD_INFO_FILE: &str = "buildInfo.json";

/// Checksums recorded after the last successful run of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalRecord {
    /// `project:task`.
    pub task_name: String,
    #[serde(default)]
    pub input_checksum: Option<String>,
    #[serde(default)]
    pub output_checksum: Option<String>,
}

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BuildInfo {
    #[serde(default)]
    tasks: Vec<IncrementalRecord>,
}

/// Persistent map from task key to its last recorded checksums.
pub trait ChecksumStore: Send + Sync {
    fn load(&self, task: &str) -> Result<Option<IncrementalRecord>>;
    /// Insert or replace the record for `record.task_name`.
    fn save(&mut self, record: IncrementalRecord) -> Result<()>;
    /// Every record, ordered by task key.
    fn records(&self) -> Result<Vec<IncrementalRecord>>;
}

/// Stores records as JSON in `<state_dir>/buildInfo.json`.
#[derive(Debug, Clone)]
pub struct FileChecksumStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileChecksumStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self::with_fs(state_dir, Arc::new(RealFileSystem))
    }

    pub fn with_fs(state_dir: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: state_dir.as_ref().join(BUILD_INFO_FILE),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<BTreeMap<String, IncrementalRecord>> {
        if !self.fs.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let text = self.fs.read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let info: BuildInfo = serde_json::from_str(&text)
            .with_context(|| format!("parsing checksum store at {:?}", self.path))?;
        Ok(info
            .tasks
            .into_iter()
            .map(|r| (r.task_name.clone(), r))
            .collect())
    }

    fn save_all(&self, map: BTreeMap<String, IncrementalRecord>) -> Result<()> {
        let info = BuildInfo {
            tasks: map.into_values().collect(),
        };
        let json = serde_json::to_string_pretty(&info)?;
        self.fs.write(&self.path, json.as_bytes())?;
        debug!(path = ?self.path, records = info.tasks.len(), "wrote checksum store");
        Ok(())
    }
}

impl ChecksumStore for FileChecksumStore {
    fn load(&self, task: &str) -> Result<Option<IncrementalRecord>> {
        Ok(self.load_all()?.remove(task))
    }

    fn save(&mut self, record: IncrementalRecord) -> Result<()> {
        let mut map = self.load_all()?;
        debug!(
            task = %record.task_name,
            input = record.input_checksum.as_deref().unwrap_or("-"),
            output = record.output_checksum.as_deref().unwrap_or("-"),
            "stored task checksums (file)"
        );
        map.insert(record.task_name.clone(), record);
        self.save_all(map)
    }

    fn records(&self) -> Result<Vec<IncrementalRecord>> {
        Ok(self.load_all()?.into_values().collect())
    }
}

/// Keeps records in memory only.
#[derive(Debug, Default)]
pub struct MemoryChecksumStore {
    map: BTreeMap<String, IncrementalRecord>,
}

impl MemoryChecksumStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChecksumStore for MemoryChecksumStore {
    fn load(&self, task: &str) -> Result<Option<IncrementalRecord>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, record: IncrementalRecord) -> Result<()> {
        debug!(task = %record.task_name, "stored task checksums (memory)");
        self.map.insert(record.task_name.clone(), record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<IncrementalRecord>> {
        Ok(self.map.values().cloned().collect())
    }
}
