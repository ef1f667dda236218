// tests/logging_init.rs
//
// Own test binary: the global subscriber can only be installed once per
// process, so nothing else here may touch it.

use buildgraph::config::ConfigFile;
use buildgraph::logging::try_init_logging;
use buildgraph::task::TaskRegistry;
use buildgraph::types::LogLevel;
use buildgraph_test_utils::builders::BuildOptionsBuilder;
use tempfile::TempDir;
use tracing::level_filters::LevelFilter;

#[tokio::test]
async fn configured_log_level_is_applied_by_run() {
    let dir = TempDir::new().unwrap();
    let mut build = BuildOptionsBuilder::new().state_dir(dir.path()).build();
    build.log_level = Some(LogLevel::Warn);
    let config = ConfigFile { build };

    let outcome = buildgraph::run(&config, &TaskRegistry::new(), &[], &[])
        .await
        .unwrap();
    assert!(outcome.result.success);
    assert_eq!(LevelFilter::current(), LevelFilter::WARN);

    // A second install keeps the first subscriber.
    assert!(!try_init_logging(Some(LogLevel::Trace)));
    assert_eq!(LevelFilter::current(), LevelFilter::WARN);
}
