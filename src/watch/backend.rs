// src/watch/backend.rs

//! Seam between the registry and the OS watcher implementation.
//!
//! Production uses [`NotifyBackend`] (cross-platform `notify` watcher).
//! Tests drive the registry and service through a fake backend that records
//! started watches and lets events be injected directly.

use std::fmt::Debug;
use std::path::PathBuf;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::Result;
use crate::types::{Category, RootBoundary, WatchEvent, WatchEventKind};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::PathFilter;

/// Opaque handle keeping an underlying watch alive.
///
/// Dropping the guard stops the watch and releases the OS handle.
pub trait WatchGuard: Send {}

/// Creates live watches for root boundaries.
pub trait WatchBackend: Send + Sync + Debug {
    /// Start watching `root` recursively, forwarding events whose paths pass
    /// `filter` into `events`, tagged with the root's identity and
    /// `category`.
    fn start(
        &self,
        root: &RootBoundary,
        category: &Category,
        filter: PathFilter,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchGuard>>;
}

/// Production backend built on `notify::RecommendedWatcher`.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

struct NotifyGuard {
    _inner: RecommendedWatcher,
}

impl WatchGuard for NotifyGuard {}

impl WatchBackend for NotifyBackend {
    fn start(
        &self,
        root: &RootBoundary,
        category: &Category,
        filter: PathFilter,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchGuard>> {
        let root_id = root.id.clone();
        let root_path: PathBuf = root.path.clone();
        let category = category.clone();

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let kind = match map_kind(&event.kind) {
                        Some(kind) => kind,
                        None => return,
                    };
                    for path in event.paths {
                        let rel = match relative_str(&root_path, &path) {
                            Some(rel) => rel,
                            None => continue,
                        };
                        if !filter.matches(&rel) {
                            continue;
                        }
                        let forwarded = events.send(WatchEvent {
                            root: root_id.clone(),
                            category: category.clone(),
                            path: path.clone(),
                            kind,
                        });
                        if forwarded.is_err() {
                            // Receiver gone; we can't log via tracing from
                            // the notify thread reliably, fall back to stderr.
                            eprintln!("rootwatch: failed to forward watch event for {:?}", path);
                        }
                    }
                }
                Err(err) => {
                    eprintln!("rootwatch: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        watcher.watch(&root.path, RecursiveMode::Recursive)?;

        info!(root = %root.id, path = ?root.path, "file watch started");

        Ok(Box::new(NotifyGuard { _inner: watcher }))
    }
}

/// Map a notify event kind onto the three kinds the pipeline cares about.
/// Access events are pure noise and are dropped here.
fn map_kind(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Created),
        EventKind::Remove(_) => Some(WatchEventKind::Removed),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(WatchEventKind::Modified),
        EventKind::Access(_) => None,
    }
}
