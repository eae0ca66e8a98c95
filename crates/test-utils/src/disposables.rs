use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use rootwatch::Disposable;

/// Shared record of disposal order, by resource name.
#[derive(Debug, Default)]
pub struct DisposalLog {
    order: Mutex<Vec<String>>,
}

impl DisposalLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, name: &str) {
        self.order.lock().unwrap().push(name.to_string());
    }

    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

/// A disposable that records its disposal in a [`DisposalLog`].
///
/// With `fail_on_dispose`, the first disposal still marks the resource
/// disposed and records the attempt, but returns an error so container
/// teardown policies can be exercised.
#[derive(Debug)]
pub struct FakeDisposable {
    name: String,
    log: Arc<DisposalLog>,
    disposed: AtomicBool,
    fail_on_dispose: bool,
}

impl FakeDisposable {
    pub fn new(name: impl Into<String>, log: Arc<DisposalLog>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            log,
            disposed: AtomicBool::new(false),
            fail_on_dispose: false,
        })
    }

    pub fn failing(name: impl Into<String>, log: Arc<DisposalLog>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            log,
            disposed: AtomicBool::new(false),
            fail_on_dispose: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Disposable for FakeDisposable {
    fn dispose(&self) -> anyhow::Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.log.record(&self.name);
        if self.fail_on_dispose {
            return Err(anyhow!("disposal of {} failed", self.name));
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
