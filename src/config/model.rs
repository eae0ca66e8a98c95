// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, RootwatchError};
use crate::types::Category;
use crate::watch::patterns::PathFilter;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [detection]
/// grace_window_secs = 10
/// write_exemption_secs = 5
///
/// [[watch]]
/// pattern = "**/*.cfg"
/// category = "restart"
/// exclude = ["**/tmp/**"]
/// ```
///
/// All sections are optional and have reasonable defaults, except that a
/// useful configuration names at least one `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub detection: RawDetectionSection,

    #[serde(default)]
    pub watch: Vec<RawWatchEntry>,
}

/// `[detection]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetectionSection {
    /// Seconds after an activity-started signal during which all raw change
    /// events are ignored.
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,

    /// Seconds a registered upcoming write stays exempt before its entry
    /// expires unconsumed.
    #[serde(default = "default_write_exemption_secs")]
    pub write_exemption_secs: u64,
}

fn default_grace_window_secs() -> u64 {
    10
}

fn default_write_exemption_secs() -> u64 {
    5
}

impl Default for RawDetectionSection {
    fn default() -> Self {
        Self {
            grace_window_secs: default_grace_window_secs(),
            write_exemption_secs: default_write_exemption_secs(),
        }
    }
}

/// One `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWatchEntry {
    pub pattern: String,

    #[serde(default)]
    pub exclude: Vec<String>,

    pub category: String,
}

/// A validated watch specification: one watcher per root per spec.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub pattern: String,
    pub exclude: Vec<String>,
    pub category: Category,
}

impl WatchSpec {
    pub fn new(pattern: impl Into<String>, category: Category) -> Self {
        Self {
            pattern: pattern.into(),
            exclude: Vec::new(),
            category,
        }
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude.push(exclude.into());
        self
    }
}

/// Validated runtime configuration for the change-detection service.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub grace_window: Duration,
    pub write_exemption_ttl: Duration,
    pub watch: Vec<WatchSpec>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(default_grace_window_secs()),
            write_exemption_ttl: Duration::from_secs(default_write_exemption_secs()),
            watch: Vec::new(),
        }
    }
}

impl TryFrom<RawConfigFile> for DetectionConfig {
    type Error = RootwatchError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        if raw.detection.grace_window_secs == 0 {
            return Err(RootwatchError::ConfigError(
                "detection.grace_window_secs must be greater than zero".to_string(),
            ));
        }
        if raw.detection.write_exemption_secs == 0 {
            return Err(RootwatchError::ConfigError(
                "detection.write_exemption_secs must be greater than zero".to_string(),
            ));
        }

        let mut watch = Vec::with_capacity(raw.watch.len());
        for entry in raw.watch {
            if entry.category.trim().is_empty() {
                return Err(RootwatchError::ConfigError(format!(
                    "watch entry {:?} has an empty category",
                    entry.pattern
                )));
            }
            // Compile once up front so bad globs fail at load time rather
            // than at the first root-added.
            PathFilter::compile(&entry.pattern, &entry.exclude).map_err(|err| {
                RootwatchError::ConfigError(format!(
                    "watch entry {:?}: {err}",
                    entry.pattern
                ))
            })?;

            watch.push(WatchSpec {
                pattern: entry.pattern,
                exclude: entry.exclude,
                category: Category::new(entry.category),
            });
        }

        Ok(Self {
            grace_window: Duration::from_secs(raw.detection.grace_window_secs),
            write_exemption_ttl: Duration::from_secs(raw.detection.write_exemption_secs),
            watch,
        })
    }
}
