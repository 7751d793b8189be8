//! HTML directory index scraper.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::discovery::scrape::{entry_for, PAGE_LIMIT};
use crate::discovery::transport::{self, HttpTransport};
use crate::error::{RoutingError, RoutingResult};

const REPOSITORY_METADATA: &str = ".meta/repository-metadata.xml";

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("href regex must compile"))
}

fn index_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(?:title|h1|h2)[^>]*>\s*(?:index of|directory listing)").expect("index regex must compile")
    })
}

fn layout_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<layout>\s*([^<\s]+)\s*</layout>").expect("layout regex must compile"))
}

pub fn is_index_page(body: &str) -> bool {
    index_title_re().is_match(body)
}

/// Refuse remotes whose own metadata says their listing is partial: proxies
/// and groups list only what they happen to hold, other layouts are not
/// routable by Maven paths.
pub async fn check_repository_metadata(transport: &HttpTransport, root: &Url) -> RoutingResult<()> {
    let url = transport::join(root, REPOSITORY_METADATA)?;
    let fetched = match transport.get(&url, PAGE_LIMIT).await {
        Ok(fetched) if fetched.status.is_success() => fetched,
        Ok(_) => return Ok(()),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "No repository metadata");
            return Ok(());
        }
    };
    let metadata = String::from_utf8_lossy(&fetched.body);

    if let Some(layout) = layout_re().captures(&metadata).and_then(|c| c.get(1)) {
        if layout.as_str() != "maven2" {
            return Err(RoutingError::StrategyFailed(format!(
                "Remote is a '{}' layout repository, cannot be scraped",
                layout.as_str()
            )));
        }
    }
    if metadata.contains("<memberRepositories>") {
        return Err(RoutingError::StrategyFailed(
            "Remote is a group repository, its listing is partial, cannot be scraped".to_string(),
        ));
    }
    if metadata.contains("<localUrl>") {
        return Err(RoutingError::StrategyFailed(
            "Remote is a proxy repository, its listing is partial, cannot be scraped".to_string(),
        ));
    }
    Ok(())
}

/// Crawl from the already fetched root page.
pub async fn scrape(
    transport: &HttpTransport,
    root: &Url,
    root_body: &str,
    max_depth: usize,
) -> RoutingResult<BTreeSet<String>> {
    let mut entries = BTreeSet::new();
    let mut queue: VecDeque<(Url, String, usize)> = VecDeque::new();
    queue.push_back((root.clone(), root_body.to_string(), 0));

    while let Some((page, body, page_depth)) = queue.pop_front() {
        let depth = page_depth + 1;
        for (link, is_directory) in child_links(&page, &body) {
            let relative = &link.path()[root.path().len()..];
            let Some(entry) = entry_for(relative) else {
                continue;
            };
            if !is_directory || depth >= max_depth {
                entries.insert(entry);
                continue;
            }
            let listing = transport.get(&link, PAGE_LIMIT).await?;
            if listing.status.is_success() {
                queue.push_back((link, String::from_utf8_lossy(&listing.body).into_owned(), depth));
            } else {
                tracing::debug!(url = %link, status = %listing.status, "Listing not available, keeping as prefix");
                entries.insert(entry);
            }
        }
    }
    Ok(entries)
}

/// Links on `page` pointing exactly one level below it, with a directory flag.
fn child_links(page: &Url, body: &str) -> Vec<(Url, bool)> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for capture in href_re().captures_iter(body) {
        let href = &capture[1];
        if href.starts_with('?') || href.starts_with('#') || href.starts_with("..") {
            continue;
        }
        let Ok(mut link) = page.join(href) else {
            continue;
        };
        link.set_query(None);
        link.set_fragment(None);
        if link.origin() != page.origin() {
            continue;
        }
        let Some(rest) = link.path().strip_prefix(page.path()) else {
            continue;
        };
        let name = rest.trim_end_matches('/');
        if name.is_empty() || name.contains('/') {
            continue;
        }
        let is_directory = rest.ends_with('/');
        if seen.insert(link.path().to_string()) {
            links.push((link, is_directory));
        }
    }
    links
}
