// src/watch/resource.rs

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::dispose::Disposable;
use crate::types::{Category, RootId};
use crate::watch::backend::WatchGuard;

/// A disposable watch handle bound to one (root boundary, pattern) pair.
///
/// The underlying OS watch stays alive until `dispose` is called, at which
/// point the guard is dropped and no further events are emitted. Disposal
/// is idempotent per resource.
pub struct WatchResource {
    root: RootId,
    key: String,
    category: Category,
    guard: Mutex<Option<Box<dyn WatchGuard>>>,
}

impl fmt::Debug for WatchResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchResource")
            .field("root", &self.root)
            .field("key", &self.key)
            .field("category", &self.category)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl WatchResource {
    pub fn new(root: RootId, key: String, category: Category, guard: Box<dyn WatchGuard>) -> Self {
        Self {
            root,
            key,
            category,
            guard: Mutex::new(Some(guard)),
        }
    }

    pub fn root(&self) -> &RootId {
        &self.root
    }

    /// The registry composite key (`rootIdentity::patternOrId`).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn category(&self) -> &Category {
        &self.category
    }
}

impl Disposable for WatchResource {
    fn dispose(&self) -> anyhow::Result<()> {
        let guard = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(guard);
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
