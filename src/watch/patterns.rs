// src/watch/patterns.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::Result;

/// Compiled watch/exclude glob patterns for one watch resource.
///
/// Patterns are evaluated against paths relative to the resource's root
/// boundary, with forward slashes (e.g. `"config/app.cfg"`).
#[derive(Clone)]
pub struct PathFilter {
    pattern: String,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl PathFilter {
    /// Compile a single watch pattern plus optional exclude patterns.
    pub fn compile(pattern: &str, excludes: &[String]) -> Result<Self> {
        let watch_set = build_globset(&[pattern.to_string()])?;
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(excludes)?)
        };

        Ok(Self {
            pattern: pattern.to_string(),
            watch_set,
            exclude_set,
        })
    }

    /// The watch pattern this filter was compiled from. Doubles as the
    /// registry identifier for the resource.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns true if a root-relative path matches the watch pattern and
    /// none of the excludes.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    Ok(builder.build()?)
}
