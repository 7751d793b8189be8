//! Local content discovery.

use crate::discovery::{DiscoveryResult, StrategyResult};
use crate::error::RoutingResult;
use crate::prefix::{path, MemoryPrefixSource};
use crate::repository::Repository;
use crate::storage::ItemKind;

pub const STRATEGY_ID: &str = "local";

/// Crawls a repository's own storage down to a fixed depth.
///
/// Files above the depth are listed as themselves, directories reaching the
/// depth are listed as prefixes. Anything deeper is covered by its
/// directory, so adding or removing one deep artifact never changes the list.
#[derive(Debug, Clone)]
pub struct LocalContentDiscoverer {
    scrape_depth: usize,
}

impl LocalContentDiscoverer {
    pub fn new(scrape_depth: usize) -> Self {
        Self {
            scrape_depth: scrape_depth.max(1),
        }
    }

    pub fn discover(&self, repository: &Repository) -> RoutingResult<DiscoveryResult> {
        let mut result = DiscoveryResult::new(&repository.id);
        let items = repository.store.walk(self.scrape_depth)?;

        let mut entries: Vec<String> = Vec::new();
        for item in items {
            if path::is_hidden(&item.path) {
                continue;
            }
            let depth = path::depth(&item.path);
            let keep = match item.kind {
                ItemKind::File => depth <= self.scrape_depth,
                ItemKind::Directory => depth == self.scrape_depth,
            };
            if keep {
                entries.push(item.path);
            }
        }

        tracing::debug!(repository = %repository.id, entries = entries.len(), "Local content discovered");
        result.record_success(StrategyResult {
            strategy_id: STRATEGY_ID,
            message: format!("Local content discovered ({} entries).", entries.len()),
            prefix_source: MemoryPrefixSource::new(entries),
        });
        Ok(result)
    }
}
