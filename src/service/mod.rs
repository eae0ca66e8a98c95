// src/service/mod.rs

//! Change-detection service: the business-logic consumer of the watcher
//! registry.
//!
//! The service creates per-root watch resources for the configured file
//! patterns and layers on top of the raw watch callbacks:
//! - hash-based true-change detection (a touch or identical rewrite is not
//!   a change),
//! - a grace window around known bulk activity,
//! - self-expiring exemptions for the tool's own writes,
//! - per-category one-shot notification flags cleared only by an explicit
//!   action-taken signal.
//!
//! The pure state machine lives in [`detector`]; this module is the async
//! IO shell around it: channels, hashing, expiry timers, disposal.

pub mod detector;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::errors::{Result, RootwatchError};
use crate::fs::FileSystem;
use crate::registry::ScopedWatcherRegistry;
use crate::types::{Category, Notification, RootBoundary, RootId, WatchEvent, WatchEventKind};
use crate::watch::backend::WatchBackend;
use crate::watch::hash::compute_file_hash;
use crate::watch::path_utils::lexical_normalize;

use detector::{DetectorCore, Precheck, SuppressReason, Verdict};

/// Caller-side condition gating notifications (e.g. "the tracked process is
/// currently running"). Queried synchronously at decision time.
pub trait NotifyGate: Send + Sync {
    fn is_open(&self) -> bool;
}

/// Gate that is always open. Useful for the demo binary and simple hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl NotifyGate for AlwaysOpen {
    fn is_open(&self) -> bool {
        true
    }
}

/// Gate backed by a shared flag the host flips as its tracked process
/// starts and stops.
#[derive(Debug, Clone, Default)]
pub struct SharedGate {
    open: Arc<AtomicBool>,
}

impl SharedGate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(open)),
        }
    }

    pub fn set(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl NotifyGate for SharedGate {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Read-only snapshot of service state, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub roots: usize,
    pub watchers: usize,
    pub hashed_paths: usize,
    pub pending_writes: usize,
    pub grace_active: bool,
}

struct ServiceInner {
    registry: ScopedWatcherRegistry,
    /// Root identity -> normalized root path. Removal from this map is the
    /// atomic point after which in-flight events for that root are rejected.
    roots: HashMap<RootId, PathBuf>,
    core: DetectorCore,
    /// Active auto-expiry timers for programmatic-write exemptions.
    expiries: HashMap<PathBuf, JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    disposed: bool,
}

struct ServiceState {
    fs: Arc<dyn FileSystem>,
    gate: Arc<dyn NotifyGate>,
    config: DetectionConfig,
    notifications: mpsc::Sender<Notification>,
    inner: Mutex<ServiceInner>,
}

impl ServiceState {
    fn lock(&self) -> MutexGuard<'_, ServiceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The change-detection service. See module docs.
///
/// Construct inside a Tokio runtime; raw watch events are consumed by a
/// background task owned by the service.
pub struct ChangeDetectionService {
    state: Arc<ServiceState>,
}

impl std::fmt::Debug for ChangeDetectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ChangeDetectionService")
            .field("stats", &stats)
            .finish()
    }
}

impl ChangeDetectionService {
    pub fn new(
        backend: Arc<dyn WatchBackend>,
        fs: Arc<dyn FileSystem>,
        gate: Arc<dyn NotifyGate>,
        config: DetectionConfig,
        notifications: mpsc::Sender<Notification>,
    ) -> Self {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<WatchEvent>();
        let registry = ScopedWatcherRegistry::new(backend, raw_tx);
        let grace = config.grace_window;

        let state = Arc::new(ServiceState {
            fs,
            gate,
            config,
            notifications,
            inner: Mutex::new(ServiceInner {
                registry,
                roots: HashMap::new(),
                core: DetectorCore::new(grace),
                expiries: HashMap::new(),
                pump: None,
                disposed: false,
            }),
        });

        let pump_state = Arc::clone(&state);
        let pump = tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                process_event(&pump_state, event).await;
            }
            debug!("watch event pump finished");
        });
        state.lock().pump = Some(pump);

        Self { state }
    }

    /// Host signal: a root boundary appeared. Creates one watch resource
    /// per configured watch spec, scoped to this root's lifetime.
    pub fn root_added(&self, root: RootBoundary) -> Result<()> {
        let root = RootBoundary {
            id: root.id,
            path: self.normalize_root(&root.path),
        };

        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }

        if inner.roots.contains_key(&root.id) {
            warn!(root = %root.id, "root already known; ignoring duplicate add");
            return Ok(());
        }

        for spec in &self.state.config.watch {
            if let Err(err) = inner.registry.create_watcher(&root, spec) {
                // Don't leave a half-watched root behind.
                inner.registry.remove_for_root(&root.id);
                return Err(err);
            }
        }
        inner.roots.insert(root.id.clone(), root.path.clone());

        info!(root = %root.id, path = ?root.path, "root boundary added");
        Ok(())
    }

    /// Host signal: a root boundary disappeared. Disposes exactly that
    /// root's watch resources and purges its detection state, atomically
    /// with respect to newly-arriving events.
    pub fn root_removed(&self, root: &RootId) -> Result<()> {
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }

        let Some(root_path) = inner.roots.remove(root) else {
            warn!(root = %root, "root not known; ignoring remove");
            return Ok(());
        };

        inner.registry.remove_for_root(root);
        inner.core.forget_under(&root_path);

        let stale: Vec<PathBuf> = inner
            .expiries
            .keys()
            .filter(|p| p.starts_with(&root_path))
            .cloned()
            .collect();
        for path in stale {
            if let Some(handle) = inner.expiries.remove(&path) {
                handle.abort();
            }
        }

        info!(root = %root, "root boundary removed");
        Ok(())
    }

    /// Command: bulk activity started. Opens a grace window and re-arms the
    /// restart flag.
    pub fn activity_started(&self) -> Result<()> {
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }
        inner.core.open_grace(Instant::now());
        Ok(())
    }

    /// Command: bulk activity stopped. Closes the grace window and resets
    /// the hash table so the next event per path seeds fresh.
    pub fn activity_stopped(&self) -> Result<()> {
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }
        inner.core.close_grace();
        Ok(())
    }

    /// Command: the tool is about to write these files itself. Each
    /// validated path is exempted from change classification until it is
    /// consumed by a matching event or its bounded timeout elapses.
    pub fn register_upcoming_writes(&self, paths: impl IntoIterator<Item = PathBuf>) -> Result<()> {
        let ttl = self.state.config.write_exemption_ttl;
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }

        for path in paths {
            let Some(path) = validate_against_roots(&inner.roots, &path) else {
                continue;
            };

            if !inner.core.note_pending_write(path.clone()) {
                debug!(?path, "write exemption already registered");
                continue;
            }

            // Replace any stale timer for a re-registered path.
            if let Some(old) = inner.expiries.remove(&path) {
                old.abort();
            }

            let state = Arc::clone(&self.state);
            let expiry_path = path.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let mut inner = state.lock();
                if inner.disposed {
                    return;
                }
                inner.expiries.remove(&expiry_path);
                if inner.core.expire_pending_write(&expiry_path) {
                    debug!(path = ?expiry_path, "write exemption expired unconsumed");
                }
            });
            inner.expiries.insert(path, handle);
        }

        Ok(())
    }

    /// Command: compute and store current hashes for these paths without
    /// producing change signals. Typically called right after the tool
    /// finished writing files itself.
    pub async fn seed_hashes(&self, paths: impl IntoIterator<Item = PathBuf>) -> Result<()> {
        let valid: Vec<PathBuf> = {
            let inner = self.state.lock();
            if inner.disposed {
                return Err(RootwatchError::Disposed("ChangeDetectionService"));
            }
            paths
                .into_iter()
                .filter_map(|p| validate_against_roots(&inner.roots, &p))
                .collect()
        };

        if valid.is_empty() {
            return Ok(());
        }

        let fs = Arc::clone(&self.state.fs);
        let hashes = tokio::task::spawn_blocking(move || {
            valid
                .into_iter()
                .map(|path| {
                    let hash = compute_file_hash(&*fs, &path);
                    (path, hash)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(anyhow::Error::from)?;

        let mut inner = self.state.lock();
        if inner.disposed {
            // Torn down while hashing; the results must not touch state.
            return Ok(());
        }
        for (path, hash) in hashes {
            match hash {
                Ok(hash) => inner.core.seed_hash(&path, hash),
                Err(err) => debug!(?path, error = %err, "file unreadable while seeding; skipped"),
            }
        }

        Ok(())
    }

    /// Command: the user acted on a notification; clear that category's
    /// one-shot flag so a later change can notify again.
    pub fn action_taken(&self, category: &Category) -> Result<()> {
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }
        inner.core.action_taken(category);
        Ok(())
    }

    /// Query: whether the category's flag is still unset this session.
    pub fn should_notify(&self, category: &Category) -> Result<bool> {
        let inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }
        Ok(inner.core.should_notify(category))
    }

    /// Command: set the category's flag without going through the
    /// detection pipeline (the host surfaced something on its own).
    pub fn mark_shown(&self, category: &Category) -> Result<()> {
        let mut inner = self.state.lock();
        if inner.disposed {
            return Err(RootwatchError::Disposed("ChangeDetectionService"));
        }
        inner.core.mark_shown(category);
        Ok(())
    }

    /// Read-only: whether a hash is currently stored for `path`.
    pub fn tracks_path(&self, path: &Path) -> bool {
        self.state.lock().core.tracks_path(&lexical_normalize(path))
    }

    /// Read-only snapshot, no side effects.
    pub fn stats(&self) -> ServiceStats {
        let inner = self.state.lock();
        ServiceStats {
            roots: inner.roots.len(),
            watchers: inner.registry.count(),
            hashed_paths: inner.core.hashed_path_count(),
            pending_writes: inner.core.pending_write_count(),
            grace_active: inner.core.grace_active(Instant::now()),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Tear the service down: cancel every pending expiry timer, stop the
    /// event pump, and dispose all watch resources. Idempotent, synchronous
    /// from the caller's point of view; no scheduled callback can fire
    /// against torn-down state afterwards.
    pub fn dispose(&self) {
        let mut inner = self.state.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;

        for (_, handle) in inner.expiries.drain() {
            handle.abort();
        }
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        inner.roots.clear();
        inner.core.clear_all();
        inner.registry.dispose();

        info!("change detection service disposed");
    }

    fn normalize_root(&self, path: &Path) -> PathBuf {
        // Canonicalize so prefix validation holds for symlinked roots;
        // fall back to lexical normalization if the root is not resolvable.
        self.state
            .fs
            .canonicalize(path)
            .unwrap_or_else(|_| lexical_normalize(path))
    }
}

/// Validate a command-supplied path against the currently known roots.
///
/// Returns the normalized path when it resolves under some root; otherwise
/// logs a security warning and returns `None` (the path is never trusted).
fn validate_against_roots(roots: &HashMap<RootId, PathBuf>, path: &Path) -> Option<PathBuf> {
    let normalized = lexical_normalize(path);
    if roots.values().any(|root| normalized.starts_with(root)) {
        Some(normalized)
    } else {
        warn!(?path, "path outside every known root boundary; rejected");
        None
    }
}

/// Drive one raw watch event through the detection pipeline.
async fn process_event(state: &Arc<ServiceState>, event: WatchEvent) {
    let path = lexical_normalize(&event.path);

    // Phase one, under the lock: root validation and the pre-hash checks.
    {
        let mut inner = state.lock();
        if inner.disposed {
            return;
        }

        // A root-removed signal and an in-flight event for a path under
        // that root can interleave; the roots map is the source of truth.
        let known = inner
            .roots
            .get(&event.root)
            .is_some_and(|root| path.starts_with(root));
        if !known {
            debug!(root = %event.root, ?path, "event for unknown or removed root; dropped");
            return;
        }

        match inner.core.precheck(&path, event.kind, Instant::now()) {
            Precheck::Suppressed(SuppressReason::GraceWindow) => {
                debug!(?path, "event ignored: grace window active");
                return;
            }
            Precheck::Suppressed(SuppressReason::ProgrammaticWrite) => {
                if let Some(handle) = inner.expiries.remove(&path) {
                    handle.abort();
                }
                debug!(?path, "event ignored: programmatic write consumed");
                return;
            }
            Precheck::Proceed => {}
        }

        if event.kind == WatchEventKind::Removed {
            inner.core.forget_path(&path);
            return;
        }
    }

    // Phase two, off the lock: hash the file.
    let fs = Arc::clone(&state.fs);
    let hash_path = path.clone();
    let hashed = tokio::task::spawn_blocking(move || compute_file_hash(&*fs, &hash_path)).await;

    let hash = match hashed {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            // Transient IO condition, not an error: no information this
            // cycle, retried naturally on the next event.
            debug!(?path, error = %err, "file unreadable; event skipped");
            return;
        }
        Err(err) => {
            warn!(?path, error = %err, "hashing task failed; event skipped");
            return;
        }
    };

    // Phase three, back under the lock: apply the hash and decide.
    let notification = {
        let mut inner = state.lock();
        if inner.disposed {
            // The read resolved after disposal; its result must not
            // mutate torn-down state.
            return;
        }
        if !inner
            .roots
            .get(&event.root)
            .is_some_and(|root| path.starts_with(root))
        {
            debug!(root = %event.root, ?path, "root removed while hashing; event dropped");
            return;
        }

        let gate_open = state.gate.is_open();
        match inner.core.apply_hash(&path, hash, &event.category, gate_open) {
            Verdict::Seeded => {
                debug!(?path, "first observation seeded");
                None
            }
            Verdict::Unchanged => {
                debug!(?path, "content unchanged; no action");
                None
            }
            Verdict::ChangedSilently => {
                debug!(?path, category = %event.category, "content changed; notification gated");
                None
            }
            Verdict::Notify => Some(Notification {
                root: event.root.clone(),
                category: event.category.clone(),
                path: path.clone(),
            }),
        }
    };

    if let Some(notification) = notification {
        info!(
            path = ?notification.path,
            category = %notification.category,
            "surfacing change notification"
        );
        if state.notifications.send(notification).await.is_err() {
            warn!("notification channel closed; host is gone");
        }
    }
}
