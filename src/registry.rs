// src/registry.rs

//! Registry of watch resources scoped to root-boundary lifetimes.
//!
//! Entries are keyed by the composite key `rootIdentity::patternOrId`; at
//! most one resource exists per key. Removing a root disposes exactly the
//! resources registered under that root. Disposing the registry disposes
//! every owned resource exactly once, in reverse creation order, via a
//! [`CompositeDisposer`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::WatchSpec;
use crate::dispose::{CompositeDisposer, Disposable};
use crate::errors::{Result, RootwatchError};
use crate::types::{RootBoundary, RootId, WatchEvent};
use crate::watch::backend::WatchBackend;
use crate::watch::patterns::PathFilter;
use crate::watch::resource::WatchResource;

fn composite_key(root: &RootId, id: &str) -> String {
    format!("{}::{}", root, id)
}

struct RegistryEntry {
    key: String,
    root: RootId,
    resource: Arc<WatchResource>,
}

struct RegistryInner {
    /// Creation order preserved; counts are small, lookups are linear.
    entries: Vec<RegistryEntry>,
    disposed: bool,
}

/// Registry of watch resources keyed by (root boundary, pattern-or-id).
pub struct ScopedWatcherRegistry {
    backend: Arc<dyn WatchBackend>,
    events: mpsc::UnboundedSender<WatchEvent>,
    disposer: CompositeDisposer,
    inner: Mutex<RegistryInner>,
}

impl std::fmt::Debug for ScopedWatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScopedWatcherRegistry")
            .field("entries", &inner.entries.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl ScopedWatcherRegistry {
    pub fn new(backend: Arc<dyn WatchBackend>, events: mpsc::UnboundedSender<WatchEvent>) -> Self {
        Self {
            backend,
            events,
            disposer: CompositeDisposer::new(),
            inner: Mutex::new(RegistryInner {
                entries: Vec::new(),
                disposed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or reuse) the watch resource for `root` + `spec`.
    ///
    /// A second request for the same (root, pattern) logs a warning and
    /// returns the existing resource; only one live OS handle ever exists
    /// per key.
    pub fn create_watcher(
        &self,
        root: &RootBoundary,
        spec: &WatchSpec,
    ) -> Result<Arc<WatchResource>> {
        let key = composite_key(&root.id, &spec.pattern);
        let mut inner = self.lock();

        if inner.disposed {
            return Err(RootwatchError::Disposed("ScopedWatcherRegistry"));
        }

        if let Some(entry) = inner.entries.iter().find(|e| e.key == key) {
            warn!(key = %key, "duplicate watcher request; reusing existing resource");
            return Ok(Arc::clone(&entry.resource));
        }

        let filter = PathFilter::compile(&spec.pattern, &spec.exclude)?;
        let guard = self
            .backend
            .start(root, &spec.category, filter, self.events.clone())?;

        let resource = Arc::new(WatchResource::new(
            root.id.clone(),
            key.clone(),
            spec.category.clone(),
            guard,
        ));

        self.disposer.add(resource.clone());
        inner.entries.push(RegistryEntry {
            key: key.clone(),
            root: root.id.clone(),
            resource: Arc::clone(&resource),
        });

        debug!(key = %key, "watch resource created");
        Ok(resource)
    }

    /// Register a caller-constructed resource under `identifier`.
    ///
    /// Used when the caller needs to attach listeners before handing the
    /// resource over. A duplicate identifier replaces the prior entry,
    /// disposing the old resource first.
    pub fn register_existing(
        &self,
        root: &RootId,
        resource: Arc<WatchResource>,
        identifier: &str,
    ) -> Result<Arc<WatchResource>> {
        let key = composite_key(root, identifier);
        let mut inner = self.lock();

        if inner.disposed {
            return Err(RootwatchError::Disposed("ScopedWatcherRegistry"));
        }

        if let Some(pos) = inner.entries.iter().position(|e| e.key == key) {
            let old = inner.entries.remove(pos);
            warn!(key = %key, "replacing existing registration; disposing previous resource");
            if let Err(err) = old.resource.dispose() {
                warn!(key = %key, error = %err, "failed to dispose replaced resource");
            }
        }

        self.disposer.add(resource.clone());
        inner.entries.push(RegistryEntry {
            key,
            root: root.clone(),
            resource: Arc::clone(&resource),
        });

        Ok(resource)
    }

    /// Dispose and remove every entry registered under `root`.
    ///
    /// Unrelated roots are untouched. Entries become unavailable atomically
    /// with respect to other registry calls.
    pub fn remove_for_root(&self, root: &RootId) {
        let mut inner = self.lock();

        let mut removed = Vec::new();
        inner.entries.retain(|e| {
            if e.root == *root {
                removed.push(Arc::clone(&e.resource));
                false
            } else {
                true
            }
        });

        for resource in removed.iter().rev() {
            if let Err(err) = resource.dispose() {
                warn!(root = %root, error = %err, "watch resource disposal failed; continuing");
            }
        }

        debug!(root = %root, count = removed.len(), "removed watch resources for root");
    }

    /// Number of live registry entries.
    pub fn count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Resources currently registered under `root`.
    pub fn for_root(&self, root: &RootId) -> Vec<Arc<WatchResource>> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.root == *root)
            .map(|e| Arc::clone(&e.resource))
            .collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Dispose every owned resource (reverse creation order, exactly once)
    /// and mark the registry disposed. Idempotent. Subsequent create or
    /// register calls fail with [`RootwatchError::Disposed`].
    pub fn dispose(&self) {
        {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.entries.clear();
        }
        // The composite disposer holds every resource ever registered;
        // per-resource idempotence makes this safe for entries already
        // disposed via remove_for_root or replacement.
        self.disposer.dispose();
    }
}
