//! Storage collaborator.
//!
//! # Data Flow
//! ```text
//! Local content discovery:
//!     ContentStore::walk(depth)  (server-side depth cutoff)
//!     → StoredItem list
//!     → prefixes up to the crawl depth
//!
//! Prefix file persistence:
//!     FilePrefixSource
//!     → ContentStore::read/write/delete at /.meta/prefixes.txt
//! ```
//!
//! # Design Decisions
//! - The routing core needs very little from storage: a depth-limited
//!   listing and whole-file read/replace. Blob layout, checksums and
//!   attributes stay behind this trait.
//! - Writes replace the file atomically so readers never see half a prefix
//!   file.
//! - Change notifications (item stored/deleted) travel over the event bus,
//!   not through this trait.

pub mod fs;
pub mod memory;

use std::fmt::Debug;
use std::io;
use std::time::SystemTime;

pub use fs::FsContentStore;
pub use memory::MemoryContentStore;

/// Kind of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Directory,
}

/// One item returned by a depth-limited walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    /// Normalized absolute path, e.g. `/org/sonatype`.
    pub path: String,
    pub kind: ItemKind,
}

impl StoredItem {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ItemKind::File,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ItemKind::Directory,
        }
    }
}

/// Content storage of one repository.
pub trait ContentStore: Send + Sync + Debug {
    /// All items at most `max_depth` segments deep. Directories at the
    /// cutoff are listed but not descended into.
    fn walk(&self, max_depth: usize) -> io::Result<Vec<StoredItem>>;

    /// Whole content of a file, `None` if absent.
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Atomically create or replace a file.
    fn write(&self, path: &str, content: &[u8]) -> io::Result<()>;

    /// Delete a file or a whole directory. Returns false if nothing existed.
    fn delete(&self, path: &str) -> io::Result<bool>;

    /// Last modification time of a file, `None` if absent.
    fn modified(&self, path: &str) -> io::Result<Option<SystemTime>>;
}
