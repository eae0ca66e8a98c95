use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use rootwatch::errors::Result;
use rootwatch::types::{Category, RootBoundary, RootId, WatchEvent, WatchEventKind};
use rootwatch::watch::backend::{WatchBackend, WatchGuard};
use rootwatch::watch::patterns::PathFilter;
use rootwatch::watch::path_utils::relative_str;

/// One watch started through the fake backend.
struct StartedWatch {
    root: RootId,
    root_path: PathBuf,
    category: Category,
    filter: PathFilter,
    events: mpsc::UnboundedSender<WatchEvent>,
    alive: Arc<AtomicBool>,
}

/// A fake watch backend that:
/// - records every started watch (root, pattern, category),
/// - tracks which underlying "handles" are still alive (guard not dropped),
/// - lets tests inject filesystem events directly, applying the same glob
///   filtering the real backend would.
#[derive(Default)]
pub struct FakeWatchBackend {
    watches: Mutex<Vec<StartedWatch>>,
}

impl std::fmt::Debug for FakeWatchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeWatchBackend")
            .field("started", &self.started_count())
            .finish()
    }
}

struct FakeGuard {
    alive: Arc<AtomicBool>,
}

impl WatchGuard for FakeGuard {}

impl Drop for FakeGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl FakeWatchBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total watches ever started (including since-disposed ones).
    pub fn started_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }

    /// Watches whose guards are still alive.
    pub fn live_count(&self) -> usize {
        self.watches
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Live watches for a specific root.
    pub fn live_count_for(&self, root: &RootId) -> usize {
        self.watches
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.root == *root && w.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Inject a filesystem event, as if the OS reported it.
    ///
    /// The event is forwarded through every live watch for `root` whose
    /// pattern matches, mirroring the real backend's filtering. Returns the
    /// number of watches that forwarded it.
    pub fn emit(&self, root: &RootId, path: impl AsRef<Path>, kind: WatchEventKind) -> usize {
        let path = path.as_ref();
        let watches = self.watches.lock().unwrap();
        let mut forwarded = 0;

        for watch in watches.iter() {
            if watch.root != *root || !watch.alive.load(Ordering::SeqCst) {
                continue;
            }
            let Some(rel) = relative_str(&watch.root_path, path) else {
                continue;
            };
            if !watch.filter.matches(&rel) {
                continue;
            }
            let sent = watch.events.send(WatchEvent {
                root: watch.root.clone(),
                category: watch.category.clone(),
                path: path.to_path_buf(),
                kind,
            });
            if sent.is_ok() {
                forwarded += 1;
            }
        }

        forwarded
    }
}

impl WatchBackend for FakeWatchBackend {
    fn start(
        &self,
        root: &RootBoundary,
        category: &Category,
        filter: PathFilter,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchGuard>> {
        let alive = Arc::new(AtomicBool::new(true));
        self.watches.lock().unwrap().push(StartedWatch {
            root: root.id.clone(),
            root_path: root.path.clone(),
            category: category.clone(),
            filter,
            events,
            alive: Arc::clone(&alive),
        });
        Ok(Box::new(FakeGuard { alive }))
    }
}
