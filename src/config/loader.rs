// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{DetectionConfig, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (glob compilation, duration sanity). Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks that durations are non-zero, categories are non-empty and glob
///   patterns compile.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<DetectionConfig> {
    let raw = load_from_path(&path)?;
    let config = DetectionConfig::try_from(raw)?;
    Ok(config)
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Rootwatch.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Rootwatch.toml")
}
