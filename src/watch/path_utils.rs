// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path does not live under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Normalize a path lexically: resolve `.` and `..` components without
/// touching the filesystem.
///
/// Inputs to the command surface are normalized this way before the
/// exact-prefix root check, so `/<root>/a/../b` and `/<root>/b` validate
/// identically and `..` cannot be used to escape a root.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` resolves under `root`, compared component-wise on
/// lexically normalized paths.
pub fn is_under(root: &Path, path: &Path) -> bool {
    lexical_normalize(path).starts_with(lexical_normalize(root))
}
