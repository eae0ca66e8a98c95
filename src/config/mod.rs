// src/config/mod.rs

//! Configuration loading and the validated runtime config model.

pub mod loader;
pub mod model;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{DetectionConfig, RawConfigFile, WatchSpec};
