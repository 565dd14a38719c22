// resfetch-core/src/cache.rs
// Content hash -> first materialized path, for one fetch run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory index of content already materialized during a run.
///
/// Not synchronized: it is owned by a single materializer and only ever touched
/// through `&mut self`. The first path recorded for a hash is kept so every
/// link created later points at the same physical copy.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: HashMap<String, PathBuf>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, hash: &str) -> Option<&Path> {
        self.entries
            .get(&hash.to_ascii_lowercase())
            .map(PathBuf::as_path)
    }

    /// Records `path` for `hash`. Returns `false` (and keeps the existing path)
    /// when the hash is already known.
    pub fn insert(&mut self, hash: &str, path: impl Into<PathBuf>) -> bool {
        let key = hash.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        let path = path.into();
        tracing::debug!("Caching {} -> {}", key, path.display());
        self.entries.insert(key, path);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
