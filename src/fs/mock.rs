// src/fs/mock.rs

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::FileSystem;
use crate::watch::path_utils::lexical_normalize;

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    unreadable: HashSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Paths are stored as given (after lexical normalization); no actual IO
/// happens. `set_unreadable` simulates transient read failures so the
/// "file unreadable -> soft ignore" branch can be exercised.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = lexical_normalize(path.as_ref());
        let mut state = self.state.lock().unwrap();
        add_dir_and_ancestors(&mut state.dirs, &path);
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = lexical_normalize(path.as_ref());
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = path.parent() {
            add_dir_and_ancestors(&mut state.dirs, parent);
        }
        state.files.insert(path, content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = lexical_normalize(path.as_ref());
        let mut state = self.state.lock().unwrap();
        state.files.remove(&path);
    }

    /// Make subsequent reads of `path` fail until the file is rewritten.
    pub fn set_unreadable(&self, path: impl AsRef<Path>) {
        let path = lexical_normalize(path.as_ref());
        self.state.lock().unwrap().unreadable.insert(path);
    }

    pub fn clear_unreadable(&self, path: impl AsRef<Path>) {
        let path = lexical_normalize(path.as_ref());
        self.state.lock().unwrap().unreadable.remove(&path);
    }
}

fn add_dir_and_ancestors(dirs: &mut HashSet<PathBuf>, path: &Path) {
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        if !dirs.insert(dir.to_path_buf()) {
            break;
        }
        current = dir.parent();
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let path = lexical_normalize(path);
        let state = self.state.lock().unwrap();
        if state.unreadable.contains(&path) {
            return Err(anyhow!("mock: {:?} is unreadable", path));
        }
        match state.files.get(&path) {
            Some(content) => Ok(Box::new(Cursor::new(content.clone()))),
            None => Err(anyhow!("mock: no such file {:?}", path)),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        let path = lexical_normalize(path);
        self.state.lock().unwrap().files.contains_key(&path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = lexical_normalize(path);
        self.state.lock().unwrap().dirs.contains(&path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        Ok(lexical_normalize(path))
    }
}
