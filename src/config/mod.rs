// src/config/mod.rs

//! `Build.toml` loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{BuildOptions, ConfigFile, RawConfigFile};
