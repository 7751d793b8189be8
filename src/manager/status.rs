//! Routing status bookkeeping.
//!
//! Publishing status is derived from the stored prefix file on every query;
//! only discovery outcomes of proxies need to be remembered.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Remote discovery state of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DStatus {
    /// Hosted and group repositories.
    NotAProxy,
    Disabled,
    /// Enabled, never ran or running now.
    EnabledInProgress,
    /// Enabled, but blocked or out of service.
    EnabledNotPossible,
    Successful,
    /// No strategy succeeded, none failed hard.
    Unsuccessful,
    Error,
}

impl DStatus {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, DStatus::NotAProxy | DStatus::Disabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PStatus {
    Published,
    NotPublished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryStatus {
    pub status: DStatus,
    pub last_strategy: Option<String>,
    pub last_message: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl DiscoveryStatus {
    pub fn new(status: DStatus) -> Self {
        Self {
            status,
            last_strategy: None,
            last_message: None,
            last_run: None,
        }
    }

    pub fn with_outcome(status: DStatus, strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            last_strategy: Some(strategy.into()),
            last_message: Some(message.into()),
            last_run: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishingStatus {
    pub status: PStatus,
    pub message: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Where the published file is served from.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingStatus {
    pub publishing: PublishingStatus,
    pub discovery: DiscoveryStatus,
}

/// Last discovery outcome per proxy repository.
#[derive(Debug, Default)]
pub struct StatusTracker {
    discovery: DashMap<String, DiscoveryStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovery(&self, repository: &str) -> Option<DiscoveryStatus> {
        self.discovery.get(repository).map(|s| s.value().clone())
    }

    pub fn record_discovery(&self, repository: &str, status: DiscoveryStatus) {
        tracing::debug!(repository, status = ?status.status, message = ?status.last_message, "Discovery status");
        self.discovery.insert(repository.to_string(), status);
    }

    /// Forget everything about `repository`, back to the initial state.
    pub fn reset(&self, repository: &str) {
        self.discovery.remove(repository);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_reset() {
        let tracker = StatusTracker::new();
        assert!(tracker.discovery("central").is_none());
        tracker.record_discovery(
            "central",
            DiscoveryStatus::with_outcome(DStatus::Error, "prefix-file", "Connection refused"),
        );
        assert_eq!(tracker.discovery("central").unwrap().status, DStatus::Error);
        tracker.reset("central");
        assert!(tracker.discovery("central").is_none());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_value(DiscoveryStatus::new(DStatus::EnabledNotPossible)).unwrap();
        assert_eq!(json["status"], "ENABLED_NOT_POSSIBLE");
        assert!(!DStatus::Disabled.is_enabled());
        assert!(DStatus::Error.is_enabled());
    }
}
