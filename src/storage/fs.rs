//! Directory-backed content store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::prefix::path;
use crate::storage::{ContentStore, ItemKind, StoredItem};

/// Stores repository content under a root directory, one file per item.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, item_path: &str) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path::segments(item_path) {
            if segment == ".." || segment == "." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes repository storage: {}", item_path),
                ));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

impl ContentStore for FsContentStore {
    fn walk(&self, max_depth: usize) -> io::Result<Vec<StoredItem>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let item_path = path::normalize(&relative.to_string_lossy());
            let kind = if entry.file_type().is_dir() {
                ItemKind::Directory
            } else {
                ItemKind::File
            };
            items.push(StoredItem {
                path: item_path,
                kind,
            });
        }
        Ok(items)
    }

    fn read(&self, item_path: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(item_path)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, item_path: &str, content: &[u8]) -> io::Result<()> {
        let target = self.resolve(item_path)?;
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(content)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)
    }

    fn delete(&self, item_path: &str) -> io::Result<bool> {
        let target = self.resolve(item_path)?;
        let result = match fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target),
            Ok(_) => fs::remove_file(&target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        result.map(|_| true)
    }

    fn modified(&self, item_path: &str) -> io::Result<Option<SystemTime>> {
        match fs::metadata(self.resolve(item_path)?) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        store.write("/archetype-catalog.xml", b"<catalog/>").unwrap();
        store.write("/org/sonatype/artifact/1.0/a.jar", b"jar").unwrap();

        let items = store.walk(2).unwrap();
        assert_eq!(
            items,
            vec![
                StoredItem::file("/archetype-catalog.xml"),
                StoredItem::directory("/org"),
                StoredItem::directory("/org/sonatype"),
            ]
        );
    }

    #[test]
    fn test_read_write_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        assert_eq!(store.read("/.meta/prefixes.txt").unwrap(), None);
        assert_eq!(store.modified("/.meta/prefixes.txt").unwrap(), None);

        store.write("/.meta/prefixes.txt", b"one").unwrap();
        store.write("/.meta/prefixes.txt", b"two").unwrap();
        assert_eq!(store.read("/.meta/prefixes.txt").unwrap(), Some(b"two".to_vec()));
        assert!(store.modified("/.meta/prefixes.txt").unwrap().is_some());

        // no staging leftovers
        let names: Vec<_> = fs::read_dir(dir.path().join(".meta"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);

        assert!(store.delete("/.meta").unwrap());
        assert!(!store.delete("/.meta").unwrap());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        assert!(store.write("/../outside", b"x").is_err());
    }
}
