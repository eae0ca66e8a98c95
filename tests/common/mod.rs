//! Shared harness for service-level tests.
//!
//! Builds a [`ChangeDetectionService`] over the mock filesystem and the fake
//! watch backend, so tests can inject filesystem events without OS handles
//! and without real IO.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use rootwatch::config::{DetectionConfig, WatchSpec};
use rootwatch::fs::mock::MockFileSystem;
use rootwatch::service::{ChangeDetectionService, SharedGate};
use rootwatch::types::{Category, Notification, RootBoundary, RootId, WatchEventKind};
use rootwatch_test_utils::fake_watch::FakeWatchBackend;
use rootwatch_test_utils::with_timeout;

pub const ROOT_A: &str = "/projects/alpha";
pub const ROOT_B: &str = "/projects/beta";

/// Default config used by most tests: `*.cfg` files feed the `restart`
/// category; `*.marker` files exist only for the settle mechanism.
pub fn default_config() -> DetectionConfig {
    DetectionConfig {
        grace_window: Duration::from_millis(200),
        write_exemption_ttl: Duration::from_millis(150),
        watch: vec![
            WatchSpec::new("**/*.cfg", Category::restart()),
            WatchSpec::new("**/*.marker", Category::new("settle")),
        ],
    }
}

pub struct Harness {
    pub fs: MockFileSystem,
    pub backend: Arc<FakeWatchBackend>,
    pub gate: SharedGate,
    pub service: ChangeDetectionService,
    pub notifications: mpsc::Receiver<Notification>,
    settle_counter: u64,
    /// Maps a root boundary path to the id it was registered under, so the
    /// path-keyed helpers (`settle`, `expect_no_notification`) can emit
    /// events to the correct watch, which is keyed by root id.
    root_ids: Mutex<HashMap<PathBuf, String>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(default_config())
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        rootwatch_test_utils::init_tracing();

        let fs = MockFileSystem::new();
        let backend = FakeWatchBackend::new();
        let gate = SharedGate::new(true);
        let (tx, rx) = mpsc::channel(64);

        let service = ChangeDetectionService::new(
            backend.clone(),
            Arc::new(fs.clone()),
            Arc::new(gate.clone()),
            config,
            tx,
        );

        Self {
            fs,
            backend,
            gate,
            service,
            notifications: rx,
            settle_counter: 0,
            root_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_root(&self, id: &str, path: &str) {
        self.fs.add_dir(path);
        self.service
            .root_added(RootBoundary::new(id, path))
            .expect("root_added failed");
        self.root_ids
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), id.to_string());
    }

    /// Look up the id a root path was registered under.
    fn root_id_for(&self, path: &str) -> String {
        self.root_ids
            .lock()
            .unwrap()
            .get(Path::new(path))
            .cloned()
            .unwrap_or_else(|| panic!("no root registered at path {path}"))
    }

    pub fn write(&self, path: impl AsRef<Path>, content: &str) {
        self.fs.add_file(path, content.as_bytes().to_vec());
    }

    pub fn emit(&self, root: &str, path: impl AsRef<Path>, kind: WatchEventKind) -> usize {
        self.backend.emit(&RootId::new(root), path, kind)
    }

    /// Write `content` to `path` and inject a Modified event for it.
    pub fn change(&self, root: &str, path: impl AsRef<Path>, content: &str) -> usize {
        self.write(path.as_ref(), content);
        self.emit(root, path, WatchEventKind::Modified)
    }

    /// Wait until every previously injected event has been fully processed.
    ///
    /// Works by emitting a fresh marker file as the last event and waiting
    /// for its hash to appear: the service pump handles events strictly in
    /// order, so once the marker is tracked, everything before it is done.
    /// Markers are new files, so they only ever seed and never notify.
    pub async fn settle(&mut self, root: &str) {
        self.settle_counter += 1;
        let path = Path::new(root).join(format!("settle-{}.marker", self.settle_counter));
        self.write(&path, "marker");
        let id = self.root_id_for(root);
        assert!(
            self.emit(&id, &path, WatchEventKind::Created) > 0,
            "settle marker was not forwarded; is the root watched?"
        );

        with_timeout(async {
            loop {
                if self.service.tracks_path(&path) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
    }

    /// Receive the next notification, failing the test after 5 seconds.
    pub async fn expect_notification(&mut self) -> Notification {
        with_timeout(self.notifications.recv())
            .await
            .expect("notification channel closed")
    }

    /// Assert that no notification is pending once the pipeline has settled.
    pub async fn expect_no_notification(&mut self, root: &str) {
        self.settle(root).await;
        match self.notifications.try_recv() {
            Err(mpsc::error::TryRecvError::Empty) => {}
            Ok(n) => panic!("unexpected notification: {n:?}"),
            Err(err) => panic!("notification channel broken: {err}"),
        }
    }
}
