// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use buildgraph::config::loader::load_from_str;
use buildgraph::config::{BuildOptions, ConfigFile, load_and_validate, load_or_default};
use buildgraph::errors::BuildError;
use buildgraph::types::LogLevel;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.build, BuildOptions::default());

    let build = &cfg.build;
    assert!(!build.parallel);
    assert_eq!(build.project_concurrency, 5);
    assert_eq!(build.task_concurrency, 1);
    assert_eq!(build.poll_interval(), Duration::from_secs(2));
    assert!(build.incremental);
    assert_eq!(build.build_info_path(), PathBuf::from(".buildgraph/buildInfo.json"));
}

#[test]
fn build_section_is_parsed() {
    let file = write_config(
        r#"
[build]
parallel = true
project_concurrency = 3
task_concurrency = 2
poll_interval_ms = 100
dry_run = true
incremental = false
profiling = true
state_dir = "out/state"
log_level = "debug"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();
    let build = cfg.build;

    assert!(build.parallel);
    assert!(build.dry_run);
    assert!(!build.incremental);
    assert!(build.profiling);
    assert_eq!(build.log_level, Some(LogLevel::Debug));
    assert_eq!(build.state_dir, PathBuf::from("out/state"));

    let outer = build.project_scheduler();
    assert_eq!(outer.concurrency, 3);
    assert_eq!(outer.poll_interval, Duration::from_millis(100));
    assert_eq!(build.task_scheduler().concurrency, 2);
}

#[test]
fn zero_concurrency_returns_config_error() {
    for key in ["project_concurrency", "task_concurrency", "poll_interval_ms"] {
        let raw = load_from_str(&format!("[build]\n{key} = 0\n")).unwrap();
        match ConfigFile::try_from(raw) {
            Err(BuildError::Config(msg)) => {
                assert!(msg.contains(key), "message should name {key}: {msg}");
                assert!(msg.contains(">= 1"));
            }
            other => panic!("Expected ConfigError for {key}, got: {other:?}"),
        }
    }
}

#[test]
fn empty_state_dir_returns_config_error() {
    let raw = load_from_str("[build]\nstate_dir = \"\"\n").unwrap();
    assert!(matches!(ConfigFile::try_from(raw), Err(BuildError::Config(_))));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = load_from_str("[build]\nparalel = true\n").unwrap_err();
    assert!(matches!(err, BuildError::Toml(_)));
}

#[test]
fn invalid_log_level_is_rejected() {
    let err = load_from_str("[build]\nlog_level = \"loud\"\n").unwrap_err();
    assert!(matches!(err, BuildError::Toml(_)));
}

#[test]
fn missing_file_is_io_error_or_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Build.toml");

    assert!(matches!(load_and_validate(&path), Err(BuildError::Io(_))));
    assert_eq!(load_or_default(&path).unwrap().build, BuildOptions::default());
}

#[test]
fn log_level_parses_from_env_style_strings() {
    assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
    assert_eq!(" trace ".parse::<LogLevel>(), Ok(LogLevel::Trace));
    assert!("verbose".parse::<LogLevel>().is_err());
}
