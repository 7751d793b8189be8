//! Prefix lists: matching, file format, storage and incremental edits.
//!
//! # Data Flow
//! ```text
//! Discovery / group aggregation
//!     → MemoryPrefixSource (entries in memory)
//!     → codec.rs (validate + serialize)
//!     → FilePrefixSource (persisted at /.meta/prefixes.txt)
//!     → matcher.rs (PathMatcher rebuilt by the admission filter)
//!
//! Item stored / deleted in a hosted repository:
//!     → editor.rs (offer / revoke, staged)
//!     → apply() atomically rewrites the FilePrefixSource
//! ```
//!
//! # Design Decisions
//! - Entries are normalized once, on the way in (path.rs)
//! - The matcher is immutable; edits happen on sources, never on trees
//! - Remote and local content share one text format and one set of limits

pub mod codec;
pub mod editor;
pub mod matcher;
pub mod path;
pub mod source;

pub use codec::{ContentEncoding, PrefixFile, PrefixFileCodec, MAGIC, UNSUPPORTED};
pub use editor::PrefixSourceEditor;
pub use matcher::PathMatcher;
pub use source::{FilePrefixSource, MemoryPrefixSource, PrefixSource, WritablePrefixSource};
