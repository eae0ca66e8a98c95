use std::fmt;
use std::path::PathBuf;

/// Stable identity of a root boundary for the lifetime of that root.
///
/// The host decides what the identity is (a workspace folder URI, an index,
/// a name); we only require that it stays stable between the matching
/// root-added and root-removed notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(String);

impl RootId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RootId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RootId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A top-level monitored folder supplied by the host.
///
/// Root boundaries are created and destroyed by the host at runtime; this
/// subsystem never invents them.
#[derive(Debug, Clone)]
pub struct RootBoundary {
    pub id: RootId,
    pub path: PathBuf,
}

impl RootBoundary {
    pub fn new(id: impl Into<RootId>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Notification category used for one-shot notification flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Well-known category for "a tracked file changed, a restart is needed".
    pub fn restart() -> Self {
        Self::new("restart")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of raw filesystem event a watch resource observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// Raw event emitted by a watch resource, before any filtering beyond the
/// resource's own glob pattern.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub root: RootId,
    pub category: Category,
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// A change the host should surface to the user.
///
/// Emitted at most once per category until the host reports the
/// corresponding action as taken.
#[derive(Debug, Clone)]
pub struct Notification {
    pub root: RootId,
    pub category: Category,
    pub path: PathBuf,
}
