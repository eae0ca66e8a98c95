// src/lib.rs

//! Resource-lifecycle and change-detection layer for tools embedded in a
//! host application.
//!
//! The host exposes dynamically changing root boundaries (top-level
//! monitored folders). This crate watches configured file patterns inside
//! each root without leaking OS watch handles, without mistaking the tool's
//! own writes for user edits, and without re-alerting for a condition the
//! user already acknowledged in the current session.
//!
//! Three components, leaves first:
//! - [`dispose::CompositeDisposer`]: LIFO, exactly-once disposal of owned
//!   resources.
//! - [`registry::ScopedWatcherRegistry`]: watch resources keyed by
//!   (root boundary, pattern), scoped to a root's lifetime.
//! - [`service::ChangeDetectionService`]: the filtering pipeline and the
//!   in-process command surface on top of raw watch events.

pub mod cli;
pub mod config;
pub mod dispose;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod service;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::types::{Notification, RootBoundary, RootId};
use crate::watch::backend::NotifyBackend;

pub use crate::dispose::{CompositeDisposer, Disposable};
pub use crate::registry::ScopedWatcherRegistry;
pub use crate::service::{AlwaysOpen, ChangeDetectionService, NotifyGate, SharedGate};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the change-detection service over the real notify backend
/// - one root boundary per CLI path
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if cfg.watch.is_empty() {
        warn!("config has no [[watch]] entries; nothing will be monitored");
    }

    let (notify_tx, mut notify_rx) = mpsc::channel::<Notification>(64);

    let service = ChangeDetectionService::new(
        Arc::new(NotifyBackend::new()),
        Arc::new(RealFileSystem),
        Arc::new(AlwaysOpen),
        cfg,
        notify_tx,
    );

    for (idx, path) in args.roots.iter().enumerate() {
        let id = RootId::new(format!("root-{idx}"));
        service.root_added(RootBoundary::new(id, path.clone()))?;
    }

    info!(roots = args.roots.len(), "rootwatch monitoring started");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for Ctrl+C");
                }
                info!("shutdown requested");
                break;
            }
            notification = notify_rx.recv() => match notification {
                Some(n) => {
                    println!(
                        "[rootwatch] {} change in {:?} (root {})",
                        n.category, n.path, n.root
                    );
                }
                None => break,
            }
        }
    }

    service.dispose();
    Ok(())
}
