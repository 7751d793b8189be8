//! Remote prefix file strategy.

use std::time::SystemTime;

use reqwest::StatusCode;

use crate::discovery::transport::{self, HttpTransport};
use crate::discovery::StrategyResult;
use crate::error::{RoutingError, RoutingResult};
use crate::prefix::{ContentEncoding, MemoryPrefixSource, PrefixFileCodec};
use crate::repository::Repository;

pub const STRATEGY_ID: &str = "prefix-file";

/// Fetches the prefix file a remote publishes about itself.
///
/// The body goes through the codec's own validation, so this fetch ignores
/// the checksum policy that applies to ordinary artifacts.
#[derive(Debug, Clone)]
pub struct PrefixFileStrategy {
    transport: HttpTransport,
    codec: PrefixFileCodec,
    path: String,
}

impl PrefixFileStrategy {
    pub fn new(transport: HttpTransport, codec: PrefixFileCodec, path: impl Into<String>) -> Self {
        Self {
            transport,
            codec,
            path: path.into(),
        }
    }

    pub async fn discover(&self, repository: &Repository) -> RoutingResult<StrategyResult> {
        let remote = repository
            .remote_url
            .as_ref()
            .ok_or_else(|| RoutingError::NotApplicable(format!("Repository '{}' has no remote", repository.id)))?;
        if !matches!(remote.scheme(), "http" | "https") {
            return Err(RoutingError::StrategyFailed(format!(
                "Remote URL scheme '{}' does not serve prefix files",
                remote.scheme()
            )));
        }
        let url = transport::join(remote, &self.path)?;
        let fetched = self.transport.get(&url, self.codec.max_size()).await?;

        if fetched.status == StatusCode::NOT_FOUND || fetched.status == StatusCode::GONE {
            return Err(RoutingError::StrategyFailed(
                "Remote does not publish prefix files".to_string(),
            ));
        }
        if !fetched.status.is_success() {
            return Err(RoutingError::Transport(format!(
                "Unexpected response code {} while fetching {}",
                fetched.status, fetched.url
            )));
        }

        let encoding = ContentEncoding::from_header(fetched.content_encoding.as_deref());
        let file = self.codec.read(&fetched.body, encoding)?;

        if file.unsupported {
            return Ok(StrategyResult {
                strategy_id: STRATEGY_ID,
                message: "Remote disabled automatic routing.".to_string(),
                prefix_source: MemoryPrefixSource::unsupported(),
            });
        }
        if file.entries.is_empty() {
            return Ok(StrategyResult {
                strategy_id: STRATEGY_ID,
                message: "Remote publishes empty prefix file.".to_string(),
                prefix_source: MemoryPrefixSource::unsupported(),
            });
        }

        let message = format!(
            "Remote publishes prefix file {}, using it.",
            age_description(fetched.last_modified, SystemTime::now())
        );
        Ok(StrategyResult {
            strategy_id: STRATEGY_ID,
            message,
            prefix_source: MemoryPrefixSource::new(file.entries).with_last_modified(fetched.last_modified),
        })
    }
}

/// "(is N days old)" from a `Last-Modified` value.
fn age_description(last_modified: Option<SystemTime>, now: SystemTime) -> String {
    match last_modified.and_then(|lm| now.duration_since(lm).ok()) {
        Some(age) => {
            let days = age.as_secs() / 86_400;
            if days == 0 {
                "(is less than a day old)".to_string()
            } else if days == 1 {
                "(is 1 day old)".to_string()
            } else {
                format!("(is {} days old)", days)
            }
        }
        None => "(age unknown)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_age_description() {
        let now = SystemTime::now();
        assert_eq!(age_description(Some(now), now), "(is less than a day old)");
        assert_eq!(
            age_description(Some(now - Duration::from_secs(3 * 86_400 + 5)), now),
            "(is 3 days old)"
        );
        assert_eq!(age_description(None, now), "(age unknown)");
    }
}
