//! Request admission filter for proxy repositories.
//!
//! # Responsibilities
//! - Decide whether a proxy should go remote for a request path
//! - Keep one matcher per proxy, swapped in when its prefix file changes
//!
//! # Design Decisions
//! - Fail open: no matcher, an unpublished file or an unknown repository
//!   admits the request
//! - Matchers are built lazily on first request and rebuilt on publish
//!   events; readers never block on a rebuild (ArcSwap)
//! - Paths below `/.meta/` are always admitted so metadata can still be fetched

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;

use crate::events::{EventListener, RoutingEvent};
use crate::manager::Manager;
use crate::observability::metrics;
use crate::prefix::{path, PathMatcher, PrefixSource};

type MatcherSlot = Arc<ArcSwapOption<PathMatcher>>;

pub struct RequestAdmissionFilter {
    manager: Manager,
    matchers: DashMap<String, MatcherSlot>,
}

impl RequestAdmissionFilter {
    pub fn new(manager: Manager) -> Self {
        Self {
            manager,
            matchers: DashMap::new(),
        }
    }

    /// Whether a request for `request_path` may be served from the remote.
    pub fn allowed(&self, repository: &str, request_path: &str) -> bool {
        let allowed = self.decide(repository, request_path);
        metrics::record_admission(allowed);
        if !allowed {
            tracing::debug!(repository, path = request_path, "Request rejected by prefix file");
        }
        allowed
    }

    fn decide(&self, repository: &str, request_path: &str) -> bool {
        if !self.manager.is_enabled() {
            return true;
        }
        let Some(repo) = self.manager.registry().get(repository) else {
            return true;
        };
        if !repo.is_proxy() {
            return true;
        }
        let normalized = path::normalize(request_path);
        if path::is_ancestor_or_self("/.meta", &normalized) {
            return true;
        }
        let slot = self.slot(repository);
        let current = slot.load();
        match current.as_ref() {
            Some(matcher) => matcher.matches(&normalized),
            None => true,
        }
    }

    /// Current matcher of a proxy, `None` when requests are not filtered.
    pub fn matcher_for(&self, repository: &str) -> Option<Arc<PathMatcher>> {
        self.slot(repository).load_full()
    }

    fn slot(&self, repository: &str) -> MatcherSlot {
        if let Some(slot) = self.matchers.get(repository) {
            return slot.value().clone();
        }
        let built = self.build(repository);
        self.matchers
            .entry(repository.to_string())
            .or_insert_with(|| Arc::new(ArcSwapOption::new(built)))
            .value()
            .clone()
    }

    fn build(&self, repository: &str) -> Option<Arc<PathMatcher>> {
        let source = self.manager.prefix_source_for(repository).ok()?;
        if !source.supported() {
            return None;
        }
        match source.read_entries() {
            Ok(entries) => Some(Arc::new(PathMatcher::new(
                entries,
                self.manager.config().matcher_max_depth,
            ))),
            Err(e) => {
                tracing::warn!(repository, error = %e, "Prefix file unreadable, not filtering");
                None
            }
        }
    }

    fn rebuild(&self, repository: &str) {
        let is_proxy = self
            .manager
            .registry()
            .get(repository)
            .is_some_and(|r| r.is_proxy());
        if !is_proxy {
            return;
        }
        let matcher = self.build(repository);
        tracing::debug!(
            repository,
            entries = matcher.as_ref().map(|m| m.len()).unwrap_or(0),
            "Admission matcher rebuilt"
        );
        self.slot(repository).store(matcher);
    }
}

impl EventListener for RequestAdmissionFilter {
    fn on_event(&self, event: &RoutingEvent) {
        match event {
            RoutingEvent::PrefixFilePublished { repository } => self.rebuild(repository),
            RoutingEvent::PrefixFileUnpublished { repository } => {
                if let Some(slot) = self.matchers.get(repository) {
                    slot.store(None);
                }
            }
            RoutingEvent::RepositoryRemoved { repository } => {
                self.matchers.remove(repository);
            }
            _ => {}
        }
    }
}
