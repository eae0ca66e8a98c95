// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! Only [`RootwatchError::Disposed`] is a hard failure the caller must
//! handle; everything else a filesystem-watching pipeline encounters at
//! runtime (unreadable files, duplicate watcher requests, paths outside
//! known roots) is absorbed and logged where it occurs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RootwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A registry or service method was invoked after disposal. This is a
    /// programming error in the caller, not a runtime condition.
    #[error("{0} used after disposal")]
    Disposed(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid glob pattern: {0}")]
    PatternError(#[from] globset::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RootwatchError>;
