//! Prefix entry normalization.
//!
//! # Rules
//! - `\` and `/` are both separators, runs of separators collapse to one
//! - a leading `.` before the first separator is dropped (`./org` → `/org`)
//! - the result always starts with `/` and never ends with one
//! - the repository root normalizes to `/`

/// Normalize a raw entry or request path.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('.').filter(|rest| {
        rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')
    });
    let body = body.unwrap_or(trimmed);

    let mut normalized = String::with_capacity(body.len() + 1);
    for segment in segments(body) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Non-empty path segments, accepting both separator styles.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}

/// Number of segments in a path.
pub fn depth(path: &str) -> usize {
    segments(path).count()
}

/// Cut a path down to its first `max_depth` segments.
pub fn truncate(path: &str, max_depth: usize) -> String {
    let mut truncated = String::new();
    for segment in segments(path).take(max_depth) {
        truncated.push('/');
        truncated.push_str(segment);
    }
    if truncated.is_empty() {
        truncated.push('/');
    }
    truncated
}

/// True when `ancestor` equals `path` or is one of its parents (segment-wise).
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    let mut candidate = segments(path);
    for segment in segments(ancestor) {
        match candidate.next() {
            Some(s) if s == segment => continue,
            _ => return false,
        }
    }
    true
}

/// Parent of a normalized path, `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let depth = depth(path);
    if depth == 0 {
        None
    } else {
        Some(truncate(path, depth - 1))
    }
}

/// True if any segment is hidden (starts with `.`), e.g. `/.meta/prefixes.txt`.
pub fn is_hidden(path: &str) -> bool {
    segments(path).any(|s| s.starts_with('.'))
}
