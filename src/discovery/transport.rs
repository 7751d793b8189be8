//! HTTP access to remotes.

use std::time::{Duration, SystemTime};

use reqwest::header::{CONTENT_ENCODING, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::{RoutingError, RoutingResult};

/// A response with its body read up to a limit.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub status: StatusCode,
    pub content_encoding: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub body: Vec<u8>,
}

/// Shared client for every remote fetch. Redirects are followed; bodies
/// are never decompressed on the fly.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeouts: &TimeoutConfig) -> RoutingResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .user_agent(concat!("repo-routing/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RoutingError::transport(&e))?;
        Ok(Self { client })
    }

    /// GET `url`, reading at most `limit + 1` body bytes.
    pub async fn get(&self, url: &Url, limit: usize) -> RoutingResult<Fetched> {
        tracing::debug!(url = %url, "Fetching");
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RoutingError::transport(&e))?;

        let status = response.status();
        let content_encoding = header_str(&response, CONTENT_ENCODING);
        let last_modified = header_str(&response, LAST_MODIFIED)
            .and_then(|raw| chrono::DateTime::parse_from_rfc2822(&raw).ok())
            .map(SystemTime::from);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| RoutingError::transport(&e))? {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                body.truncate(limit + 1);
                break;
            }
        }

        Ok(Fetched {
            url: response.url().clone(),
            status,
            content_encoding,
            last_modified,
            body,
        })
    }
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `base` with `path` appended below its own path.
pub fn join(base: &Url, path: &str) -> RoutingResult<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| RoutingError::InvalidInput(format!("Invalid URL '{}': {}", joined, e)))
}
