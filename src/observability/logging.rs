//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable through `RUST_LOG`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor a config level is usable.
pub const DEFAULT_DIRECTIVE: &str = "repo_routing=info,tower_http=info";

/// Filter for the given config level. `RUST_LOG` wins when set.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("repo_routing={level},tower_http={level}")))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_tracing(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
