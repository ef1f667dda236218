// tests/fs_checksum.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildgraph::fs::{FileSystem, MockFileSystem, RealFileSystem};
use buildgraph::incremental::{
    ChecksumStore, FileChecksumStore, IncrementalRecord, compute_aggregate_hash,
    compute_file_hash, compute_hash_for_paths,
};

#[test]
fn test_mock_fs_hashing() {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world");

    let hash = compute_file_hash(&fs, &PathBuf::from("test.txt")).unwrap();
    // blake3 hash of "hello world"
    assert_eq!(hash, "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24");
}

#[test]
fn hash_for_paths_walks_directories_in_stable_order() {
    let fs = MockFileSystem::new();
    fs.add_file("src/main.rs", b"fn main() {}");
    fs.add_file("src/util/mod.rs", b"pub fn util() {}");
    fs.add_file("README.md", b"# Readme");

    let a = compute_hash_for_paths(&fs, ["src", "README.md"]).unwrap();
    let b = compute_hash_for_paths(&fs, ["README.md", "src"]).unwrap();
    assert!(a.is_some());
    assert_eq!(a, b);

    let src_only = compute_hash_for_paths(&fs, ["src"]).unwrap();
    assert_ne!(a, src_only);
}

#[test]
fn hash_for_paths_changes_with_content_and_names() {
    let fs = MockFileSystem::new();
    fs.add_file("src/main.rs", b"fn main() {}");
    let before = compute_hash_for_paths(&fs, ["src"]).unwrap();

    fs.add_file("src/main.rs", b"fn main() { println!(); }");
    let edited = compute_hash_for_paths(&fs, ["src"]).unwrap();
    assert_ne!(before, edited);

    fs.remove_file("src/main.rs");
    fs.add_file("src/lib.rs", b"fn main() { println!(); }");
    let renamed = compute_hash_for_paths(&fs, ["src"]).unwrap();
    assert_ne!(edited, renamed);
}

#[test]
fn hash_for_missing_paths_is_none() {
    let fs = MockFileSystem::new();
    assert_eq!(compute_hash_for_paths(&fs, ["target/classes"]).unwrap(), None);
}

#[test]
fn aggregate_hash_depends_on_order() {
    let a = compute_aggregate_hash(&["x".to_string(), "y".to_string()]);
    let b = compute_aggregate_hash(&["y".to_string(), "x".to_string()]);
    assert_ne!(a, b);
    assert_eq!(a, compute_aggregate_hash(&["x".to_string(), "y".to_string()]));
}

#[test]
fn mock_fs_directories_are_implicit() {
    let fs = MockFileSystem::new();
    fs.add_file("a/b/c.txt", b"c");
    fs.add_file("a/d.txt", b"d");

    assert!(fs.is_dir(Path::new("a")));
    assert!(fs.is_dir(Path::new("a/b")));
    assert!(fs.is_file(Path::new("a/d.txt")));
    assert!(!fs.exists(Path::new("a/e.txt")));
    assert_eq!(
        fs.read_dir(Path::new("a")).unwrap(),
        vec![PathBuf::from("a/b"), PathBuf::from("a/d.txt")]
    );
    assert!(fs.read_to_string(Path::new("a")).is_err());
}

#[test]
fn file_store_works_on_the_mock_fs() {
    let fs = Arc::new(MockFileSystem::new());
    let mut store = FileChecksumStore::with_fs(".buildgraph", fs.clone());
    assert!(fs.is_empty());

    store
        .save(IncrementalRecord {
            task_name: "core:compile".to_string(),
            input_checksum: Some("in".to_string()),
            output_checksum: Some("out".to_string()),
        })
        .unwrap();

    assert!(fs.is_file(Path::new(".buildgraph/buildInfo.json")));
    let loaded = store.load("core:compile").unwrap().unwrap();
    assert_eq!(loaded.input_checksum.as_deref(), Some("in"));
}

#[test]
fn corrupt_store_is_reported() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file(".buildgraph/buildInfo.json", b"{ not json");
    let store = FileChecksumStore::with_fs(".buildgraph", fs);
    let err = store.load("core:compile").unwrap_err();
    assert!(format!("{err:#}").contains("parsing checksum store"));
}

#[test]
fn real_fs_write_replaces_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");
    let fs = RealFileSystem;

    fs.write(&path, b"one").unwrap();
    fs.write(&path, b"two").unwrap();

    assert_eq!(fs.read_to_string(&path).unwrap(), "two");
    assert_eq!(fs.read_dir(&dir.path().join("nested")).unwrap(), vec![path]);
}
