//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the routing service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// HTTP listener (prefix files + admin API).
    pub listener: ListenerConfig,

    /// Automatic routing settings.
    pub routing: RoutingConfig,

    /// Where repository content lives.
    pub storage: StorageConfig,

    /// Remote fetch timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Repository definitions.
    pub repositories: Vec<RepositoryConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Automatic routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Feature switch. When off, nothing is discovered and every request is admitted.
    pub enabled: bool,

    /// Depth of the local content crawl (and of incremental edits).
    pub local_scrape_depth: usize,

    /// Depth of remote scraping.
    pub remote_scrape_depth: usize,

    /// Depth of the admission filter's prefix tree.
    pub matcher_max_depth: usize,

    /// Location of the prefix file, locally and on remotes.
    pub prefix_file_path: String,

    /// Period of the background updater in seconds.
    pub update_interval_secs: u64,

    /// Default remote discovery interval of a proxy, in seconds.
    pub default_discovery_interval_secs: u64,

    /// Maximum prefix file size in bytes (after decompression).
    pub max_file_size: usize,

    /// Maximum length of a single prefix file line.
    pub max_line_length: usize,

    /// Maximum number of entries in a prefix file.
    pub max_entries: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            local_scrape_depth: 2,
            remote_scrape_depth: 2,
            matcher_max_depth: 2,
            prefix_file_path: "/.meta/prefixes.txt".to_string(),
            update_interval_secs: 3600,
            default_discovery_interval_secs: 24 * 3600,
            max_file_size: 128 * 1024,
            max_line_length: 250,
            max_entries: 100_000,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory, one sub-directory per repository id.
    /// Without one, repository content is kept in memory.
    pub root: Option<String>,
}

/// Timeout configuration for remote fetches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Whole request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Kind of repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    Hosted,
    Proxy,
    Group,
}

/// Whether a proxy may contact its remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    #[default]
    Allow,
    /// Blocked by an administrator.
    BlockedManual,
    /// Blocked automatically after remote failures.
    BlockedAuto,
}

impl ProxyMode {
    pub fn should_proxy(&self) -> bool {
        matches!(self, ProxyMode::Allow)
    }
}

/// One repository definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RepositoryConfig {
    /// Unique repository identifier.
    pub id: String,

    /// Human readable name, defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    pub kind: RepositoryKind,

    /// Member ids, groups only. Order is significant.
    #[serde(default)]
    pub members: Vec<String>,

    /// Remote base URL, proxies only.
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub proxy_mode: ProxyMode,

    /// Out of service repositories are never updated.
    #[serde(default = "default_true")]
    pub in_service: bool,

    /// Remote discovery switch, proxies only.
    #[serde(default = "default_true")]
    pub discovery_enabled: bool,

    /// Remote discovery interval override in seconds, proxies only.
    #[serde(default)]
    pub discovery_interval_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: RouterConfig = toml::from_str(
            r#"
            [[repositories]]
            id = "central"
            kind = "proxy"
            remote_url = "https://repo1.maven.org/maven2/"

            [[repositories]]
            id = "public"
            kind = "group"
            members = ["central"]
            "#,
        )
        .unwrap();

        assert!(config.routing.enabled);
        assert_eq!(config.routing.prefix_file_path, "/.meta/prefixes.txt");
        assert_eq!(config.repositories.len(), 2);
        let central = &config.repositories[0];
        assert_eq!(central.kind, RepositoryKind::Proxy);
        assert_eq!(central.proxy_mode, ProxyMode::Allow);
        assert!(central.in_service);
        assert!(central.discovery_enabled);
        assert_eq!(config.repositories[1].members, vec!["central"]);
    }

    #[test]
    fn test_proxy_mode_parsing() {
        let repo: RepositoryConfig = toml::from_str(
            r#"
            id = "p"
            kind = "proxy"
            proxy_mode = "blocked_manual"
            "#,
        )
        .unwrap();
        assert!(!repo.proxy_mode.should_proxy());
    }
}
