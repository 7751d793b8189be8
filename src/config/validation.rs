//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (group members reference existing repositories)
//! - Validate value ranges (depths and limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Member cycles are accepted here; the router breaks them at runtime

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{RepositoryKind, RouterConfig};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let routing = &config.routing;
    for (field, value) in [
        ("routing.local_scrape_depth", routing.local_scrape_depth),
        ("routing.remote_scrape_depth", routing.remote_scrape_depth),
        ("routing.matcher_max_depth", routing.matcher_max_depth),
        ("routing.max_file_size", routing.max_file_size),
        ("routing.max_line_length", routing.max_line_length),
        ("routing.max_entries", routing.max_entries),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if routing.update_interval_secs == 0 {
        errors.push(ValidationError::new("routing.update_interval_secs", "must be greater than zero"));
    }
    if !routing.prefix_file_path.starts_with('/') {
        errors.push(ValidationError::new("routing.prefix_file_path", "must be an absolute path"));
    }
    if config.timeouts.connect_secs == 0 || config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts", "must be greater than zero"));
    }

    let mut ids = HashSet::new();
    for repo in &config.repositories {
        if repo.id.is_empty() || repo.id.contains('/') {
            errors.push(ValidationError::new(
                "repositories.id",
                format!("'{}' is not a valid repository id", repo.id),
            ));
        }
        if !ids.insert(repo.id.as_str()) {
            errors.push(ValidationError::new(
                "repositories.id",
                format!("duplicate repository id '{}'", repo.id),
            ));
        }
    }

    for repo in &config.repositories {
        let field = |name: &str| format!("repositories.{}.{}", repo.id, name);
        match repo.kind {
            RepositoryKind::Proxy => match repo.remote_url.as_deref() {
                None => errors.push(ValidationError::new(field("remote_url"), "proxy needs a remote URL")),
                Some(raw) => {
                    if let Err(e) = Url::parse(raw) {
                        errors.push(ValidationError::new(field("remote_url"), format!("'{}': {}", raw, e)));
                    }
                }
            },
            RepositoryKind::Group => {
                for member in &repo.members {
                    if member == &repo.id {
                        errors.push(ValidationError::new(field("members"), "group cannot contain itself"));
                    } else if !ids.contains(member.as_str()) {
                        errors.push(ValidationError::new(
                            field("members"),
                            format!("unknown member '{}'", member),
                        ));
                    }
                }
            }
            RepositoryKind::Hosted => {}
        }
        if repo.kind != RepositoryKind::Group && !repo.members.is_empty() {
            errors.push(ValidationError::new(field("members"), "only groups have members"));
        }
        if repo.discovery_interval_secs == Some(0) {
            errors.push(ValidationError::new(field("discovery_interval_secs"), "must be greater than zero"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ProxyMode, RepositoryConfig};

    fn repo(id: &str, kind: RepositoryKind) -> RepositoryConfig {
        RepositoryConfig {
            id: id.to_string(),
            name: None,
            kind,
            members: Vec::new(),
            remote_url: None,
            proxy_mode: ProxyMode::Allow,
            in_service: true,
            discovery_enabled: true,
            discovery_interval_secs: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RouterConfig::default();
        config.routing.local_scrape_depth = 0;
        config.routing.prefix_file_path = "prefixes.txt".into();
        config.repositories.push(repo("central", RepositoryKind::Proxy));
        let mut group = repo("public", RepositoryKind::Group);
        group.members = vec!["central".into(), "nowhere".into()];
        config.repositories.push(group);
        config.repositories.push(repo("central", RepositoryKind::Hosted));

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"routing.local_scrape_depth"));
        assert!(fields.contains(&"routing.prefix_file_path"));
        assert!(fields.contains(&"repositories.central.remote_url"));
        assert!(fields.contains(&"repositories.public.members"));
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_member_cycles_are_accepted() {
        let mut config = RouterConfig::default();
        let mut a = repo("a", RepositoryKind::Group);
        a.members = vec!["b".into()];
        let mut b = repo("b", RepositoryKind::Group);
        b.members = vec!["a".into()];
        config.repositories = vec![a, b];
        assert!(validate_config(&config).is_ok());
    }
}
