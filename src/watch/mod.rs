// src/watch/mod.rs

//! Watch resources and change primitives.
//!
//! This module is responsible for:
//! - Compiling watch/exclude glob patterns per watch resource.
//! - Wiring up a cross-platform filesystem watcher (`notify`) behind the
//!   [`backend::WatchBackend`] seam.
//! - Content hashing so the service can tell real changes from touches and
//!   benign rewrites.
//!
//! It does **not** decide whether the user should be told about a change;
//! that is the change-detection service's job.

pub mod backend;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod resource;

pub use backend::{NotifyBackend, WatchBackend, WatchGuard};
pub use hash::{compute_file_hash, FileHashTable, HashTransition};
pub use patterns::PathFilter;
pub use resource::WatchResource;
