//! Remote scraping strategy, the fallback when a remote publishes no prefix file.
//!
//! # Scrapers
//! - `s3.rs`: Amazon S3 bucket listings (`ListBucketResult`), walked per
//!   key prefix with `delimiter=/`
//! - `html.rs`: HTML directory indexes ("Index of" pages) crawled link by link
//!
//! Both stop at the configured remote scrape depth: files above it become
//! entries, directories reaching it become prefixes.

pub mod html;
pub mod s3;

use std::collections::BTreeSet;

use crate::discovery::transport::HttpTransport;
use crate::discovery::StrategyResult;
use crate::error::{RoutingError, RoutingResult};
use crate::prefix::MemoryPrefixSource;
use crate::repository::Repository;

pub const STRATEGY_ID: &str = "scrape";

/// Upper bound for one listing page.
pub const PAGE_LIMIT: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ScrapeStrategy {
    transport: HttpTransport,
    depth: usize,
}

impl ScrapeStrategy {
    pub fn new(transport: HttpTransport, depth: usize) -> Self {
        Self {
            transport,
            depth: depth.max(1),
        }
    }

    pub async fn discover(&self, repository: &Repository) -> RoutingResult<StrategyResult> {
        let remote = repository
            .remote_url
            .as_ref()
            .ok_or_else(|| RoutingError::NotApplicable(format!("Repository '{}' has no remote", repository.id)))?;
        if !matches!(remote.scheme(), "http" | "https") {
            return Err(RoutingError::StrategyFailed(format!(
                "Remote URL scheme '{}' cannot be scraped",
                remote.scheme()
            )));
        }

        let mut root = remote.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }

        let page = self.transport.get(&root, PAGE_LIMIT).await?;
        if !page.status.is_success() {
            return Err(RoutingError::StrategyFailed(format!(
                "Remote root responded with unexpected code {}, cannot be scraped",
                page.status
            )));
        }
        let body = String::from_utf8_lossy(&page.body);

        let (scraper, entries): (&str, BTreeSet<String>) = if s3::is_bucket_listing(&body) {
            ("Amazon S3 bucket", s3::scrape(&self.transport, &root, self.depth).await?)
        } else if html::is_index_page(&body) {
            html::check_repository_metadata(&self.transport, &root).await?;
            ("HTML directory index", html::scrape(&self.transport, &root, &body, self.depth).await?)
        } else {
            return Err(RoutingError::StrategyFailed(
                "Remote is not a recognized directory listing, cannot be scraped".to_string(),
            ));
        };

        if entries.is_empty() {
            return Err(RoutingError::StrategyFailed(format!(
                "Remote recognized as {}, but no content was found",
                scraper
            )));
        }

        tracing::debug!(repository = %repository.id, scraper, entries = entries.len(), "Remote scraped");
        Ok(StrategyResult {
            strategy_id: STRATEGY_ID,
            message: format!("Remote recognized as {}, scraped {} entries.", scraper, entries.len()),
            prefix_source: MemoryPrefixSource::new(entries.into_iter().collect()),
        })
    }
}

/// Entry path for a listing path relative to the scrape root, `None` for
/// the root itself and for hidden items.
pub(crate) fn entry_for(relative: &str) -> Option<String> {
    let entry = crate::prefix::path::normalize(relative);
    if entry == "/" || crate::prefix::path::is_hidden(&entry) {
        None
    } else {
        Some(entry)
    }
}
