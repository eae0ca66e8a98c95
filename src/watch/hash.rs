// src/watch/hash.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the content hash of a single file through the filesystem
/// abstraction.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// How a newly observed hash relates to the stored one for that path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashTransition {
    /// First observation of this path; stored without signalling a change.
    Seeded,
    /// Identical to the stored hash (a touch or a benign rewrite).
    Unchanged,
    /// Differs from the stored hash; the stored hash has been updated.
    Changed,
}

/// `path -> last observed content hash`.
///
/// A path's classification becomes "changed" only when a newly computed
/// hash differs from the previously stored hash for that exact path.
#[derive(Debug, Default)]
pub struct FileHashTable {
    hashes: HashMap<PathBuf, String>,
}

impl FileHashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed hash and report the transition.
    pub fn record(&mut self, path: &Path, hash: String) -> HashTransition {
        match self.hashes.get(path) {
            None => {
                debug!(?path, "seeding hash for first observation");
                self.hashes.insert(path.to_path_buf(), hash);
                HashTransition::Seeded
            }
            Some(old) if *old == hash => HashTransition::Unchanged,
            Some(_) => {
                self.hashes.insert(path.to_path_buf(), hash);
                HashTransition::Changed
            }
        }
    }

    /// Store a hash unconditionally, without reporting a transition.
    /// Used by the seed-hashes command.
    pub fn seed(&mut self, path: &Path, hash: String) {
        self.hashes.insert(path.to_path_buf(), hash);
    }

    /// Drop the entry for a path (e.g. the file was removed), so a later
    /// re-create seeds fresh instead of comparing against a stale hash.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.hashes.remove(path).is_some()
    }

    /// Drop every entry under `prefix`.
    pub fn forget_under(&mut self, prefix: &Path) {
        self.hashes.retain(|p, _| !p.starts_with(prefix));
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.hashes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
