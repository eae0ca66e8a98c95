// src/dispose.rs

//! Generic resource disposal.
//!
//! [`CompositeDisposer`] owns a set of [`Disposable`] resources and
//! guarantees:
//! - disposal happens in reverse order of addition (LIFO),
//! - each resource is asked to dispose exactly once,
//! - `dispose()` is idempotent,
//! - a resource added after the container was disposed is released
//!   immediately instead of being stored.
//!
//! When an individual resource fails to dispose during composite teardown,
//! the failure is logged at warn level and teardown continues with the
//! remaining resources (log-and-continue policy, see DESIGN.md).

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

/// A resource that can be released exactly once.
///
/// `dispose` must be idempotent per resource: a second call is a no-op
/// returning `Ok(())`. Implementations typically guard with an internal
/// flag or by `take`-ing an inner handle.
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> anyhow::Result<()>;
    fn is_disposed(&self) -> bool;
}

struct Inner {
    items: Vec<Arc<dyn Disposable>>,
    disposed: bool,
}

/// Container that owns zero or more disposable resources.
pub struct CompositeDisposer {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CompositeDisposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CompositeDisposer")
            .field("items", &inner.items.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl Default for CompositeDisposer {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeDisposer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                disposed: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `resource` for later disposal and return it unchanged.
    ///
    /// If the container is already disposed, the resource is disposed
    /// immediately instead of being stored, so nothing is ever silently
    /// dropped without being released.
    pub fn add(&self, resource: Arc<dyn Disposable>) -> Arc<dyn Disposable> {
        let late = {
            let mut inner = self.lock();
            if inner.disposed {
                true
            } else {
                inner.items.push(Arc::clone(&resource));
                false
            }
        };

        if late {
            debug!("resource added to a disposed container; releasing immediately");
            dispose_one(&resource);
        }

        resource
    }

    /// Number of resources currently held.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Dispose every stored resource in reverse order of addition, then mark
    /// the container disposed. A second call is a no-op.
    pub fn dispose(&self) {
        let drained = {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            std::mem::take(&mut inner.items)
        };

        for resource in drained.iter().rev() {
            dispose_one(resource);
        }
    }
}

fn dispose_one(resource: &Arc<dyn Disposable>) {
    if let Err(err) = resource.dispose() {
        warn!(error = %err, "resource disposal failed; continuing teardown");
    }
}
