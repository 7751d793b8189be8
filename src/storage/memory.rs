//! In-memory content store, for repositories without a storage root and for tests.

use std::collections::BTreeMap;
use std::io;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use crate::prefix::path;
use crate::storage::{ContentStore, ItemKind, StoredItem};

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    files: RwLock<BTreeMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file, builder style.
    pub fn with_file(self, item_path: &str, content: &[u8]) -> Self {
        // infallible for the memory store
        let _ = self.write(item_path, content);
        self
    }
}

impl ContentStore for MemoryContentStore {
    fn walk(&self, max_depth: usize) -> io::Result<Vec<StoredItem>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: BTreeMap<String, ItemKind> = BTreeMap::new();
        for file in files.keys() {
            let depth = path::depth(file);
            for level in 1..depth.min(max_depth + 1) {
                items.insert(path::truncate(file, level), ItemKind::Directory);
            }
            if depth <= max_depth {
                items.insert(file.clone(), ItemKind::File);
            }
        }
        Ok(items
            .into_iter()
            .map(|(path, kind)| StoredItem { path, kind })
            .collect())
    }

    fn read(&self, item_path: &str) -> io::Result<Option<Vec<u8>>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(&path::normalize(item_path)).map(|(c, _)| c.clone()))
    }

    fn write(&self, item_path: &str, content: &[u8]) -> io::Result<()> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(
            path::normalize(item_path),
            (content.to_vec(), SystemTime::now()),
        );
        Ok(())
    }

    fn delete(&self, item_path: &str) -> io::Result<bool> {
        let target = path::normalize(item_path);
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let before = files.len();
        files.retain(|file, _| !path::is_ancestor_or_self(&target, file));
        Ok(files.len() != before)
    }

    fn modified(&self, item_path: &str) -> io::Result<Option<SystemTime>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(&path::normalize(item_path)).map(|(_, t)| *t))
    }
}
