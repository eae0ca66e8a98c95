// src/service/detector.rs

//! Pure change-detection state machine.
//!
//! This module contains a synchronous, deterministic core that owns the
//! session-scoped detection state:
//! - the file hash table,
//! - the programmatic-write set,
//! - the grace window,
//! - the per-category one-shot notification flags.
//!
//! The async/IO shell ([`super::ChangeDetectionService`]) is responsible
//! for watch channels, hashing files, expiry timers and delivering
//! notifications. The core takes explicit `Instant`s and precomputed
//! hashes, so it can be extensively tested without Tokio, channels or a
//! filesystem.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{Category, WatchEventKind};
use crate::watch::hash::{FileHashTable, HashTransition};

/// A bounded time span during which all raw change events are ignored.
#[derive(Debug, Clone, Copy)]
pub struct GraceWindow {
    opened_at: Instant,
    duration: Duration,
}

impl GraceWindow {
    pub fn open(now: Instant, duration: Duration) -> Self {
        Self {
            opened_at: now,
            duration,
        }
    }

    /// Expiry is evaluated lazily: the window is active while `now` falls
    /// inside `opened_at + duration`. Checking never mutates state.
    pub fn is_active(&self, now: Instant) -> bool {
        now.duration_since(self.opened_at) < self.duration
    }
}

/// Why an event was suppressed before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// A grace window is currently active.
    GraceWindow,
    /// The path was pre-registered as one of the tool's own writes; the
    /// entry has been consumed.
    ProgrammaticWrite,
}

/// Outcome of the pre-hash checks for one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    Suppressed(SuppressReason),
    Proceed,
}

/// Outcome of applying a freshly computed hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First observation; state seeded, nothing to surface.
    Seeded,
    /// Identical content; nothing to surface.
    Unchanged,
    /// Content changed, but the gate is closed or the category was already
    /// notified this session; state updated silently.
    ChangedSilently,
    /// Content changed and the category's one-shot flag was just set; the
    /// shell must surface a notification.
    Notify,
}

/// Session-scoped detection state. See module docs.
#[derive(Debug)]
pub struct DetectorCore {
    hashes: FileHashTable,
    pending_writes: HashSet<PathBuf>,
    grace: Option<GraceWindow>,
    shown: HashSet<Category>,
    grace_duration: Duration,
}

impl DetectorCore {
    pub fn new(grace_duration: Duration) -> Self {
        Self {
            hashes: FileHashTable::new(),
            pending_writes: HashSet::new(),
            grace: None,
            shown: HashSet::new(),
            grace_duration,
        }
    }

    /// Steps 1 and 2 of the event pipeline: grace window, then programmatic
    /// write consumption.
    ///
    /// A grace-window suppression mutates nothing. A programmatic-write
    /// suppression consumes the entry, so it exempts exactly the next
    /// matching content-bearing event. Removal events do not consume an
    /// exemption: for an atomic replace the content-bearing half of the
    /// event pair is still on its way.
    pub fn precheck(&mut self, path: &Path, kind: WatchEventKind, now: Instant) -> Precheck {
        if let Some(grace) = &self.grace {
            if grace.is_active(now) {
                return Precheck::Suppressed(SuppressReason::GraceWindow);
            }
        }

        if kind != WatchEventKind::Removed && self.pending_writes.remove(path) {
            return Precheck::Suppressed(SuppressReason::ProgrammaticWrite);
        }

        Precheck::Proceed
    }

    /// Steps 4 to 6: seed, compare, and gate the one-shot notification.
    ///
    /// `gate_open` is the caller-side dependent condition (e.g. a tracked
    /// process is active). The flag for `category` is set if and only if
    /// this returns [`Verdict::Notify`].
    pub fn apply_hash(
        &mut self,
        path: &Path,
        hash: String,
        category: &Category,
        gate_open: bool,
    ) -> Verdict {
        match self.hashes.record(path, hash) {
            HashTransition::Seeded => Verdict::Seeded,
            HashTransition::Unchanged => Verdict::Unchanged,
            HashTransition::Changed => {
                if gate_open && !self.shown.contains(category) {
                    self.shown.insert(category.clone());
                    Verdict::Notify
                } else {
                    Verdict::ChangedSilently
                }
            }
        }
    }

    /// Open a grace window and re-arm the restart flag, so the first
    /// meaningful change after this activity can notify again.
    pub fn open_grace(&mut self, now: Instant) {
        self.grace = Some(GraceWindow::open(now, self.grace_duration));
        self.shown.remove(&Category::restart());
        debug!(duration = ?self.grace_duration, "grace window opened");
    }

    /// Close the grace window and reset the hash table; the next event per
    /// path seeds fresh.
    pub fn close_grace(&mut self) {
        self.grace = None;
        self.hashes.clear();
        debug!("grace window closed; hash table cleared");
    }

    pub fn grace_active(&self, now: Instant) -> bool {
        self.grace.is_some_and(|g| g.is_active(now))
    }

    /// Register a path as an upcoming programmatic write. Returns false if
    /// the path was already registered.
    pub fn note_pending_write(&mut self, path: PathBuf) -> bool {
        self.pending_writes.insert(path)
    }

    /// Remove an unconsumed exemption after its timeout. Returns true if
    /// the entry was still present.
    pub fn expire_pending_write(&mut self, path: &Path) -> bool {
        self.pending_writes.remove(path)
    }

    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.len()
    }

    /// Store a hash without producing a change signal (seed-hashes command).
    pub fn seed_hash(&mut self, path: &Path, hash: String) {
        self.hashes.seed(path, hash);
    }

    /// Drop the hash entry for a removed file.
    pub fn forget_path(&mut self, path: &Path) {
        if self.hashes.forget(path) {
            debug!(?path, "dropped hash entry for removed file");
        }
    }

    /// Drop all state tied to paths under a removed root boundary.
    pub fn forget_under(&mut self, root_path: &Path) {
        self.hashes.forget_under(root_path);
        self.pending_writes.retain(|p| !p.starts_with(root_path));
    }

    pub fn hashed_path_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn tracks_path(&self, path: &Path) -> bool {
        self.hashes.contains(path)
    }

    /// Drop all session state. Used when the owning service is disposed.
    pub fn clear_all(&mut self) {
        self.hashes.clear();
        self.pending_writes.clear();
        self.grace = None;
        self.shown.clear();
    }

    /// Whether the category's one-shot flag is still unset this session.
    pub fn should_notify(&self, category: &Category) -> bool {
        !self.shown.contains(category)
    }

    /// Clear a category's flag after the user acted on the notification.
    pub fn action_taken(&mut self, category: &Category) {
        self.shown.remove(category);
    }

    /// Set a category's flag without going through the detection pipeline.
    pub fn mark_shown(&mut self, category: &Category) {
        self.shown.insert(category.clone());
    }
}
