//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → repository registry diffs the new repository list
//!     → registry events drive the routing manager
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ListenerConfig, ObservabilityConfig, ProxyMode, RepositoryConfig, RepositoryKind, RouterConfig,
    RoutingConfig, StorageConfig, TimeoutConfig,
};
