//! Amazon S3 bucket listing scraper.

use std::collections::{BTreeSet, VecDeque};
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::discovery::scrape::{entry_for, PAGE_LIMIT};
use crate::discovery::transport::HttpTransport;
use crate::error::{RoutingError, RoutingResult};

/// Listing pages followed per key prefix before giving up.
const MAX_PAGES: usize = 100;

fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<Contents>\s*<Key>([^<]*)</Key>").expect("key regex must compile"))
}

fn common_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<CommonPrefixes>\s*<Prefix>([^<]*)</Prefix>").expect("prefix regex must compile")
    })
}

fn next_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("marker regex must compile"))
}

pub fn is_bucket_listing(body: &str) -> bool {
    body.contains("<ListBucketResult")
}

/// One page of a delimited listing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
    /// Marker for the next page when the listing is truncated.
    pub next_marker: Option<String>,
}

pub fn parse_listing(body: &str) -> ListingPage {
    let keys: Vec<String> = key_re().captures_iter(body).map(|c| unescape(&c[1])).collect();
    let common_prefixes = common_prefix_re()
        .captures_iter(body)
        .map(|c| unescape(&c[1]))
        .collect();
    let next_marker = if body.contains("<IsTruncated>true</IsTruncated>") {
        next_marker_re()
            .captures(body)
            .map(|c| unescape(&c[1]))
            .or_else(|| keys.last().cloned())
    } else {
        None
    };
    ListingPage {
        keys,
        common_prefixes,
        next_marker,
    }
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Walk the bucket below `root`'s path, one key prefix per level.
pub async fn scrape(transport: &HttpTransport, root: &Url, max_depth: usize) -> RoutingResult<BTreeSet<String>> {
    let base_prefix = root.path().trim_start_matches('/').to_string();
    let mut bucket = root.clone();
    bucket.set_path("/");

    let mut entries = BTreeSet::new();
    let mut queue = VecDeque::from([(base_prefix.clone(), 0usize)]);

    while let Some((prefix, prefix_depth)) = queue.pop_front() {
        let depth = prefix_depth + 1;
        let mut marker: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = list(transport, &bucket, &prefix, marker.as_deref()).await?;
            for key in &page.keys {
                if key.ends_with('/') {
                    continue;
                }
                if let Some(entry) = key.strip_prefix(&base_prefix).and_then(entry_for) {
                    entries.insert(entry);
                }
            }
            for common in &page.common_prefixes {
                let Some(entry) = common.strip_prefix(&base_prefix).and_then(entry_for) else {
                    continue;
                };
                if depth >= max_depth {
                    entries.insert(entry);
                } else {
                    queue.push_back((common.clone(), depth));
                }
            }
            marker = page.next_marker;
            if marker.is_none() {
                break;
            }
        }
    }
    Ok(entries)
}

async fn list(transport: &HttpTransport, bucket: &Url, prefix: &str, marker: Option<&str>) -> RoutingResult<ListingPage> {
    let mut url = bucket.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("prefix", prefix).append_pair("delimiter", "/");
        if let Some(marker) = marker {
            query.append_pair("marker", marker);
        }
    }
    let fetched = transport.get(&url, PAGE_LIMIT).await?;
    if !fetched.status.is_success() {
        return Err(RoutingError::Transport(format!(
            "Unexpected response code {} while listing {}",
            fetched.status, url
        )));
    }
    Ok(parse_listing(&String::from_utf8_lossy(&fetched.body)))
}
