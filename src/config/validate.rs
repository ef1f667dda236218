// src/config/validate.rs

use crate::config::model::{BuildOptions, ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_build_options(&raw.build)?;
        Ok(ConfigFile::new_unchecked(raw.build))
    }
}

fn validate_build_options(build: &BuildOptions) -> Result<()> {
    if build.project_concurrency == 0 {
        return Err(BuildError::Config(
            "[build].project_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if build.task_concurrency == 0 {
        return Err(BuildError::Config(
            "[build].task_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if build.poll_interval_ms == 0 {
        return Err(BuildError::Config(
            "[build].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if build.state_dir.as_os_str().is_empty() {
        return Err(BuildError::Config(
            "[build].state_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
