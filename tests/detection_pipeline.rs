//! The per-path detection state machine: seeding, hash dedupe, one-shot
//! notification flags, gate behaviour, removal handling, root scoping.

mod common;

use std::path::Path;
use std::time::Duration;

use common::{Harness, ROOT_A, ROOT_B};
use rootwatch::config::{DetectionConfig, WatchSpec};
use rootwatch::types::{Category, RootId, WatchEventKind};

fn cfg_path(root: &str, name: &str) -> std::path::PathBuf {
    Path::new(root).join(name)
}

#[tokio::test]
async fn first_observation_seeds_without_notifying() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "initial");
    assert!(h.emit("A", &a_cfg, WatchEventKind::Created) > 0);

    h.expect_no_notification(ROOT_A).await;
    assert!(h.service.tracks_path(&a_cfg));
}

#[tokio::test]
async fn identical_content_never_notifies() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "same");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.settle(ROOT_A).await;

    // A save with identical content, a touch, a benign rewrite.
    h.emit("A", &a_cfg, WatchEventKind::Modified);
    h.emit("A", &a_cfg, WatchEventKind::Modified);

    h.expect_no_notification(ROOT_A).await;
}

#[tokio::test]
async fn changed_content_notifies_once_until_action_taken() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "v1");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.settle(ROOT_A).await;

    // First real change fires the restart notification.
    h.change("A", &a_cfg, "v2");
    let n = h.expect_notification().await;
    assert_eq!(n.category, Category::restart());
    assert_eq!(n.root, RootId::new("A"));
    assert!(!h.service.should_notify(&Category::restart()).unwrap());

    // Second change before acknowledgment stays silent.
    h.change("A", &a_cfg, "v3");
    h.expect_no_notification(ROOT_A).await;

    // After the action is taken, a third change notifies again.
    h.service.action_taken(&Category::restart()).unwrap();
    h.change("A", &a_cfg, "v4");
    let n = h.expect_notification().await;
    assert_eq!(n.category, Category::restart());
}

#[tokio::test]
async fn closed_gate_updates_state_silently() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "v1");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.settle(ROOT_A).await;

    h.gate.set(false);
    h.change("A", &a_cfg, "v2");
    h.expect_no_notification(ROOT_A).await;
    // The flag was not consumed by the gated change.
    assert!(h.service.should_notify(&Category::restart()).unwrap());

    // The silent change updated the stored hash: re-sending v2 content is
    // "unchanged", only new content notifies.
    h.gate.set(true);
    h.emit("A", &a_cfg, WatchEventKind::Modified);
    h.expect_no_notification(ROOT_A).await;

    h.change("A", &a_cfg, "v3");
    h.expect_notification().await;
}

#[tokio::test]
async fn unreadable_file_is_skipped_without_state_change() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "v1");
    h.fs.set_unreadable(&a_cfg);
    h.emit("A", &a_cfg, WatchEventKind::Created);

    h.expect_no_notification(ROOT_A).await;
    assert!(!h.service.tracks_path(&a_cfg));

    // Retried naturally on the next event once readable again.
    h.fs.clear_unreadable(&a_cfg);
    h.emit("A", &a_cfg, WatchEventKind::Modified);
    h.settle(ROOT_A).await;
    assert!(h.service.tracks_path(&a_cfg));
}

#[tokio::test]
async fn removed_file_reseeds_on_recreate() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "v1");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.settle(ROOT_A).await;
    assert!(h.service.tracks_path(&a_cfg));

    h.fs.remove_file(&a_cfg);
    h.emit("A", &a_cfg, WatchEventKind::Removed);
    h.settle(ROOT_A).await;
    assert!(!h.service.tracks_path(&a_cfg));

    // Re-creating the file (even with different content than before the
    // removal) seeds fresh rather than comparing against a stale hash.
    h.write(&a_cfg, "v2");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.expect_no_notification(ROOT_A).await;
    assert!(h.service.tracks_path(&a_cfg));
}

#[tokio::test]
async fn non_matching_paths_are_never_forwarded() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);

    let readme = cfg_path(ROOT_A, "README.md");
    h.write(&readme, "hello");
    assert_eq!(h.emit("A", &readme, WatchEventKind::Created), 0);

    h.expect_no_notification(ROOT_A).await;
}

#[tokio::test]
async fn excluded_paths_are_filtered_before_the_pipeline() {
    let mut h = Harness::with_config(DetectionConfig {
        grace_window: Duration::from_millis(200),
        write_exemption_ttl: Duration::from_millis(150),
        watch: vec![
            WatchSpec::new("**/*.cfg", Category::restart()).with_exclude("**/generated/**"),
            WatchSpec::new("**/*.marker", Category::new("settle")),
        ],
    });
    h.add_root("A", ROOT_A);

    let generated = Path::new(ROOT_A).join("generated/auto.cfg");
    h.write(&generated, "v1");
    assert_eq!(h.emit("A", &generated, WatchEventKind::Created), 0);

    let hand_written = cfg_path(ROOT_A, "a.cfg");
    h.write(&hand_written, "v1");
    assert!(h.emit("A", &hand_written, WatchEventKind::Created) > 0);

    h.expect_no_notification(ROOT_A).await;
    assert!(h.service.tracks_path(&hand_written));
    assert!(!h.service.tracks_path(&generated));
}

#[tokio::test]
async fn removing_one_root_leaves_the_other_watching() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);
    h.add_root("B", ROOT_B);
    assert_eq!(h.service.stats().watchers, 4);

    let b_cfg = cfg_path(ROOT_B, "b.cfg");
    h.write(&b_cfg, "v1");
    h.emit("B", &b_cfg, WatchEventKind::Created);
    h.settle(ROOT_B).await;

    h.service.root_removed(&RootId::new("A")).unwrap();
    assert_eq!(h.service.stats().roots, 1);
    assert_eq!(h.service.stats().watchers, 2);

    // A's watch resources are gone; events no longer flow.
    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    h.write(&a_cfg, "v1");
    assert_eq!(h.emit("A", &a_cfg, WatchEventKind::Created), 0);

    // B continues to emit and detect.
    h.change("B", &b_cfg, "v2");
    let n = h.expect_notification().await;
    assert_eq!(n.root, RootId::new("B"));
}

#[tokio::test]
async fn removing_a_root_purges_its_detection_state() {
    let mut h = Harness::new();
    h.add_root("A", ROOT_A);
    h.add_root("B", ROOT_B);

    let a_cfg = cfg_path(ROOT_A, "a.cfg");
    let b_cfg = cfg_path(ROOT_B, "b.cfg");
    h.write(&a_cfg, "v1");
    h.write(&b_cfg, "v1");
    h.emit("A", &a_cfg, WatchEventKind::Created);
    h.emit("B", &b_cfg, WatchEventKind::Created);
    h.settle(ROOT_A).await;
    h.settle(ROOT_B).await;

    h.service.root_removed(&RootId::new("A")).unwrap();

    assert!(!h.service.tracks_path(&a_cfg));
    assert!(h.service.tracks_path(&b_cfg));
}
