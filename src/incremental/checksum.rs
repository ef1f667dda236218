// src/incremental/checksum.rs

//! blake3 helpers for computing task input/output checksums.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Hash of a single file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let reader = fs.open_read(path)?;
    let mut hasher = Hasher::new();
    hasher
        .update_reader(reader)
        .with_context(|| format!("hashing {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Deterministic hash over every file under `paths` (directories are walked).
///
/// Each file contributes its path and its content hash, so renames change
/// the result. Returns `None` when no file exists under any of the paths.
pub fn compute_hash_for_paths<I, P>(fs: &dyn FileSystem, paths: I) -> Result<Option<String>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut files = Vec::new();
    for path in paths {
        collect_files(fs, path.as_ref(), &mut files)?;
    }
    files.sort();
    files.dedup();

    if files.is_empty() {
        return Ok(None);
    }

    let mut hasher = Hasher::new();
    for file in &files {
        debug!(file = %file.display(), "hashing file");
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(compute_file_hash(fs, file)?.as_bytes());
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, files = files.len(), "computed aggregate hash");
    Ok(Some(hash))
}

fn collect_files(fs: &dyn FileSystem, path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if fs.is_file(path) {
        out.push(path.to_path_buf());
    } else if fs.is_dir(path) {
        for entry in fs.read_dir(path)? {
            collect_files(fs, &entry, out)?;
        }
    }
    Ok(())
}

/// Combine already computed hashes, in the given order.
pub fn compute_aggregate_hash(hashes: &[String]) -> String {
    let mut hasher = Hasher::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
