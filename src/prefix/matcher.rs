//! Depth-capped prefix tree.
//!
//! # Responsibilities
//! - Answer "does this request path fall under a known prefix?"
//! - Answer "is this path itself one of the recorded entries?"
//!
//! # Design Decisions
//! - One tree level per path segment, at most `max_depth` levels. Longer
//!   entries are cut at the cap, so anything below a capped node matches.
//! - Least specific entry wins: a terminal node drops its children, and
//!   insertion stops at the first terminal node on its way down. Result is
//!   independent of insertion order.
//! - Immutable once built. Updates happen at the prefix source level and the
//!   matcher is rebuilt.

use std::collections::{HashMap, HashSet};

use crate::prefix::path;

#[derive(Debug, Default)]
struct Node {
    terminal: bool,
    children: HashMap<String, Node>,
}

/// Prefix tree built from a flat entry list.
#[derive(Debug)]
pub struct PathMatcher {
    root: Node,
    entries: HashSet<String>,
    max_depth: usize,
}

impl PathMatcher {
    /// Build a matcher. A `max_depth` of 0 is treated as 1.
    pub fn new<I, S>(entries: I, max_depth: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self {
            root: Node::default(),
            entries: HashSet::new(),
            max_depth: max_depth.max(1),
        };
        for entry in entries {
            matcher.insert(&path::normalize(entry.as_ref()));
        }
        matcher
    }

    fn insert(&mut self, entry: &str) {
        self.entries.insert(entry.to_string());

        let mut node = &mut self.root;
        if node.terminal {
            return;
        }
        for segment in path::segments(entry).take(self.max_depth) {
            node = node.children.entry(segment.to_string()).or_default();
            if node.terminal {
                // an ancestor already covers this entry
                return;
            }
        }
        node.terminal = true;
        node.children.clear();
    }

    /// True if some leading run of `path`'s segments is a recorded prefix.
    pub fn matches(&self, path: &str) -> bool {
        let mut node = &self.root;
        if node.terminal {
            return true;
        }
        let normalized = path::normalize(path);
        for segment in path::segments(&normalized).take(self.max_depth) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
            if node.terminal {
                return true;
            }
        }
        false
    }

    /// True only if `path` normalizes to one of the original entries.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(&path::normalize(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
