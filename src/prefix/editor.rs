//! Incremental edits of a stored prefix list.
//!
//! # Responsibilities
//! - Stage additions and removals against a writable prefix source
//! - Keep the list consistent with matcher semantics (same depth cap, least
//!   specific entry wins)
//! - Write the result back in one atomic replace
//!
//! # Design Decisions
//! - Offers are cut to `max_depth` segments, exactly like a local crawl
//!   records them, so an artifact deep below an existing prefix is a no-op.
//! - Revokes are not cut. Deleting one deep artifact cannot shrink a broader
//!   prefix; deleting the prefix folder itself (or one of its parents) can.

use std::collections::HashSet;

use crate::error::RoutingResult;
use crate::prefix::path;
use crate::prefix::source::WritablePrefixSource;

/// Batches prefix list changes until [`PrefixSourceEditor::apply`].
pub struct PrefixSourceEditor<'a, S: WritablePrefixSource + ?Sized> {
    source: &'a S,
    max_depth: usize,
    original: Vec<String>,
    staged: Vec<String>,
}

impl<'a, S: WritablePrefixSource + ?Sized> PrefixSourceEditor<'a, S> {
    /// Read the current list from `source`.
    pub fn new(source: &'a S, max_depth: usize) -> RoutingResult<Self> {
        let original: Vec<String> = source
            .read_entries()?
            .iter()
            .map(|e| path::normalize(e))
            .collect();
        Ok(Self {
            source,
            max_depth: max_depth.max(1),
            staged: original.clone(),
            original,
        })
    }

    /// Stage an addition. Returns false if an existing entry already covers it.
    pub fn offer_entry(&mut self, entry: &str) -> bool {
        let candidate = path::truncate(&path::normalize(entry), self.max_depth);
        let covered = self
            .staged
            .iter()
            .any(|e| path::is_ancestor_or_self(&path::truncate(e, self.max_depth), &candidate));
        if covered {
            return false;
        }
        self.staged
            .retain(|e| !path::is_ancestor_or_self(&candidate, e));
        self.staged.push(candidate);
        true
    }

    /// Stage a removal of `entry` and everything listed below it.
    ///
    /// Returns false when nothing listed is at or below `entry`, including the
    /// case where only a broader entry covers it.
    pub fn revoke_entry(&mut self, entry: &str) -> bool {
        let target = path::normalize(entry);
        let before = self.staged.len();
        self.staged
            .retain(|e| !path::is_ancestor_or_self(&target, e));
        self.staged.len() != before
    }

    pub fn has_changes(&self) -> bool {
        let original: HashSet<&String> = self.original.iter().collect();
        let staged: HashSet<&String> = self.staged.iter().collect();
        original != staged
    }

    /// Drop staged edits. Returns whether there were any.
    pub fn reset(&mut self) -> bool {
        let had_changes = self.has_changes();
        self.staged = self.original.clone();
        had_changes
    }

    /// Write staged edits through the source. Returns whether anything was written.
    pub fn apply(&mut self) -> RoutingResult<bool> {
        if !self.has_changes() {
            return Ok(false);
        }
        self.source.write_entries(&self.staged)?;
        self.original = self.staged.clone();
        Ok(true)
    }

    /// Current staged list.
    pub fn entries(&self) -> &[String] {
        &self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::codec::PrefixFileCodec;
    use crate::prefix::source::{FilePrefixSource, PrefixSource};
    use crate::storage::MemoryContentStore;
    use std::sync::Arc;

    fn source_with(entries: &[&str]) -> FilePrefixSource {
        let source = FilePrefixSource::new(
            Arc::new(MemoryContentStore::new()),
            "/.meta/prefixes.txt",
            PrefixFileCodec::default(),
        );
        let entries: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
        source.write_entries(&entries).unwrap();
        source
    }

    #[test]
    fn test_offer_covered_entry_is_noop() {
        let source = source_with(&["/org/sonatype", "/org/apache"]);
        let mut editor = PrefixSourceEditor::new(&source, 2).unwrap();
        assert!(!editor.offer_entry("/org/sonatype/nexus"));
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_revoke_and_apply() {
        let source = source_with(&["/org/sonatype", "/org/apache"]);
        let mut editor = PrefixSourceEditor::new(&source, 2).unwrap();
        assert!(editor.revoke_entry("/org/sonatype"));
        assert!(editor.has_changes());
        assert!(editor.apply().unwrap());
        assert!(!editor.has_changes());
        assert_eq!(source.read_entries().unwrap(), vec!["/org/apache"]);
    }

    #[test]
    fn test_offer_is_cut_to_depth() {
        let source = source_with(&["/org/apache"]);
        let mut editor = PrefixSourceEditor::new(&source, 2).unwrap();
        assert!(editor.offer_entry("/com/example/lib/1.0/lib-1.0.jar"));
        assert!(!editor.offer_entry("/com/example/other/2.0"));
        assert!(editor.apply().unwrap());
        assert_eq!(source.read_entries().unwrap(), vec!["/org/apache", "/com/example"]);
    }

    #[test]
    fn test_offer_ancestor_replaces_descendants() {
        let source = source_with(&["/org/apache/maven", "/org/apache/ant"]);
        let mut editor = PrefixSourceEditor::new(&source, 3).unwrap();
        assert!(editor.offer_entry("/org/apache"));
        assert_eq!(editor.entries(), &["/org/apache".to_string()]);
    }

    #[test]
    fn test_revoke_deep_path_under_prefix_is_noop() {
        let source = source_with(&["/org/sonatype"]);
        let mut editor = PrefixSourceEditor::new(&source, 2).unwrap();
        assert!(!editor.revoke_entry("/org/sonatype/nexus/1.0/nexus-1.0.jar"));
        assert!(!editor.revoke_entry("/com/unrelated"));
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_revoke_ancestor_removes_children() {
        let source = source_with(&["/a/b/c", "/x"]);
        let mut editor = PrefixSourceEditor::new(&source, 4).unwrap();
        assert!(editor.revoke_entry("/a"));
        assert!(editor.has_changes());
        // child went with its ancestor
        assert!(!editor.revoke_entry("/a/b/c"));
        assert_eq!(editor.entries(), &["/x".to_string()]);
    }

    #[test]
    fn test_reset() {
        let source = source_with(&["/org/apache"]);
        let mut editor = PrefixSourceEditor::new(&source, 2).unwrap();
        assert!(!editor.reset());
        assert!(editor.offer_entry("/com/example"));
        assert!(editor.reset());
        assert!(!editor.has_changes());
        assert!(!editor.apply().unwrap());
        assert_eq!(source.read_entries().unwrap(), vec!["/org/apache"]);
    }
}
