// src/fs/mod.rs

//! Filesystem seam for the checksum store and the checksum helpers, so both
//! can run against [`MockFileSystem`] in tests.

use std::fmt::Debug;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub use mock::MockFileSystem;

pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Streaming reader, used when hashing large outputs.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Replace the file at `path`, creating parent directories. Readers never
    /// observe a partially written file.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Full paths of the entries of a directory, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        File::open(path)
            .map(|f| Box::new(f) as Box<dyn Read + Send>)
            .with_context(|| format!("failed to open {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?,
            _ => {}
        }

        let staged = sibling_tmp(path);
        let mut file = File::create(&staged)
            .with_context(|| format!("failed to create {}", staged.display()))?;
        file.write_all(contents)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("failed to write {}", staged.display()))?;
        drop(file);

        fs::rename(&staged, path)
            .with_context(|| format!("failed to move {} into place", staged.display()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .and_then(|dir| dir.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>())
            .with_context(|| format!("failed to list {}", path.display()))?;
        entries.sort();
        Ok(entries)
    }
}
