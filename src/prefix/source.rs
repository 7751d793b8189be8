//! Prefix sources: a prefix list for one repository, wherever it lives.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::RoutingResult;
use crate::prefix::codec::{ContentEncoding, PrefixFile, PrefixFileCodec};
use crate::storage::ContentStore;

/// Read access to a repository's prefix list.
pub trait PrefixSource: Send + Sync + Debug {
    /// A list was computed and stored at some point.
    fn exists(&self) -> bool;

    /// Routing admission may rely on this list.
    fn supported(&self) -> bool;

    /// The entries. Read failures surface as I/O errors.
    fn read_entries(&self) -> RoutingResult<Vec<String>>;

    fn last_modified(&self) -> Option<SystemTime>;
}

/// A prefix source that can be replaced or removed.
pub trait WritablePrefixSource: PrefixSource {
    /// Atomically replace the stored list.
    fn write_entries(&self, entries: &[String]) -> RoutingResult<()>;

    fn delete(&self) -> RoutingResult<()>;
}

/// Prefix list held in memory, produced by discovery and group aggregation.
#[derive(Debug, Clone)]
pub struct MemoryPrefixSource {
    entries: Vec<String>,
    supported: bool,
    last_modified: Option<SystemTime>,
}

impl MemoryPrefixSource {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries,
            supported: true,
            last_modified: Some(SystemTime::now()),
        }
    }

    /// A source stating that no reliable index exists.
    pub fn unsupported() -> Self {
        Self {
            entries: Vec::new(),
            supported: false,
            last_modified: Some(SystemTime::now()),
        }
    }

    pub fn with_last_modified(mut self, last_modified: Option<SystemTime>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

impl PrefixSource for MemoryPrefixSource {
    fn exists(&self) -> bool {
        true
    }

    fn supported(&self) -> bool {
        self.supported
    }

    fn read_entries(&self) -> RoutingResult<Vec<String>> {
        Ok(self.entries.clone())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }
}

/// Prefix file persisted in a repository's own storage.
///
/// Unpublishing writes a file carrying the unsupported directive, so a
/// repository that was discovered without a usable result still `exists()`.
#[derive(Debug, Clone)]
pub struct FilePrefixSource {
    store: Arc<dyn ContentStore>,
    path: String,
    codec: PrefixFileCodec,
}

impl FilePrefixSource {
    pub fn new(store: Arc<dyn ContentStore>, path: impl Into<String>, codec: PrefixFileCodec) -> Self {
        Self {
            store,
            path: path.into(),
            codec,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parse the stored file, `None` if there is none.
    pub fn load(&self) -> RoutingResult<Option<PrefixFile>> {
        match self.store.read(&self.path)? {
            Some(bytes) => Ok(Some(self.codec.read(&bytes, ContentEncoding::Identity)?)),
            None => Ok(None),
        }
    }

    /// Raw stored bytes, for serving the file to downstream peers.
    pub fn raw(&self) -> RoutingResult<Option<Vec<u8>>> {
        Ok(self.store.read(&self.path)?)
    }

    /// Mark the repository as having no usable index.
    pub fn write_unsupported(&self) -> RoutingResult<()> {
        let bytes = self.codec.write(&PrefixFile {
            entries: Vec::new(),
            unsupported: true,
        })?;
        self.store.write(&self.path, &bytes)?;
        Ok(())
    }
}

impl PrefixSource for FilePrefixSource {
    fn exists(&self) -> bool {
        matches!(self.store.modified(&self.path), Ok(Some(_)))
    }

    fn supported(&self) -> bool {
        match self.load() {
            Ok(Some(file)) => !file.unsupported,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Stored prefix file unreadable");
                false
            }
        }
    }

    fn read_entries(&self) -> RoutingResult<Vec<String>> {
        Ok(self
            .load()?
            .filter(|file| !file.unsupported)
            .map(|file| file.entries)
            .unwrap_or_default())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.store.modified(&self.path).ok().flatten()
    }
}

impl WritablePrefixSource for FilePrefixSource {
    fn write_entries(&self, entries: &[String]) -> RoutingResult<()> {
        let bytes = self.codec.write(&PrefixFile {
            entries: entries.to_vec(),
            unsupported: false,
        })?;
        self.store.write(&self.path, &bytes)?;
        Ok(())
    }

    fn delete(&self) -> RoutingResult<()> {
        self.store.delete(&self.path)?;
        Ok(())
    }
}
