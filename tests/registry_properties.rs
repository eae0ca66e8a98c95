//! Property: for all sequences of root-add/root-remove operations, the
//! registry count after `remove_for_root` equals the count before minus
//! exactly the number of watchers registered for that root, and a final
//! dispose releases every live handle.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use tokio::sync::mpsc;

use rootwatch::config::WatchSpec;
use rootwatch::types::{Category, RootBoundary, RootId};
use rootwatch::ScopedWatcherRegistry;
use rootwatch_test_utils::fake_watch::FakeWatchBackend;

#[derive(Debug, Clone)]
enum Op {
    /// Create watchers for patterns `p0..p{nspecs-1}` under the root.
    Add { root: usize, nspecs: usize },
    Remove { root: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, 1..4usize).prop_map(|(root, nspecs)| Op::Add { root, nspecs }),
        (0..4usize).prop_map(|root| Op::Remove { root }),
    ]
}

fn root_boundary(idx: usize) -> RootBoundary {
    RootBoundary::new(format!("root-{idx}"), format!("/work/root-{idx}"))
}

fn spec(idx: usize) -> WatchSpec {
    WatchSpec::new(format!("**/*.p{idx}"), Category::restart())
}

proptest! {
    #[test]
    fn remove_for_root_subtracts_exactly_that_roots_watchers(
        ops in proptest::collection::vec(op_strategy(), 1..40)
    ) {
        let backend = FakeWatchBackend::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry = ScopedWatcherRegistry::new(backend.clone(), tx);

        // Model: per-root count of distinct patterns currently registered.
        let mut model: HashMap<usize, usize> = HashMap::new();

        for op in ops {
            match op {
                Op::Add { root, nspecs } => {
                    let boundary = root_boundary(root);
                    for i in 0..nspecs {
                        // Duplicate (root, pattern) requests reuse the
                        // existing resource, so the model takes the max.
                        registry.create_watcher(&boundary, &spec(i)).unwrap();
                    }
                    let entry = model.entry(root).or_insert(0);
                    *entry = (*entry).max(nspecs);
                }
                Op::Remove { root } => {
                    let before = registry.count();
                    let expected_removed = model.remove(&root).unwrap_or(0);
                    registry.remove_for_root(&RootId::new(format!("root-{root}")));
                    prop_assert_eq!(registry.count(), before - expected_removed);
                }
            }

            let expected_total: usize = model.values().sum();
            prop_assert_eq!(registry.count(), expected_total);

            for (root, count) in &model {
                prop_assert_eq!(
                    registry.for_root(&RootId::new(format!("root-{root}"))).len(),
                    *count
                );
            }
        }

        registry.dispose();
        prop_assert_eq!(registry.count(), 0);
        prop_assert_eq!(backend.live_count(), 0);
    }
}

#[test]
fn backend_guard_drops_with_registry_dispose() {
    let backend: Arc<FakeWatchBackend> = FakeWatchBackend::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    let registry = ScopedWatcherRegistry::new(backend.clone(), tx);

    registry.create_watcher(&root_boundary(0), &spec(0)).unwrap();
    assert_eq!(backend.live_count(), 1);

    registry.dispose();
    assert_eq!(backend.live_count(), 0);
}
