// src/fs/mock.rs

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};

use super::FileSystem;

/// In-memory filesystem. Directories exist implicitly as the parents of
/// stored files.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.files().remove(path.as_ref()).is_some()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    fn contents(&self, path: &Path) -> Result<Vec<u8>> {
        let found = self.files().get(path).cloned();
        match found {
            Some(content) => Ok(content),
            None if self.is_dir(path) => Err(anyhow!("{} is a directory", path.display())),
            None => Err(anyhow!("no such file: {}", path.display())),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        String::from_utf8(self.contents(path)?).map_err(|e| anyhow!("{} is not UTF-8: {e}", path.display()))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.contents(path)?)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files()
            .keys()
            .any(|f| f != path && f.starts_with(path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files();
        let mut entries: Vec<PathBuf> = files
            .keys()
            .filter(|f| *f != path)
            .filter_map(|f| f.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| path.join(first))
            .collect();
        if entries.is_empty() {
            return Err(anyhow!("no such directory: {}", path.display()));
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}
