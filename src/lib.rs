//! Automatic repository routing.
//!
//! Keeps a per-repository prefix index ("which top-level paths exist here"),
//! publishes it as a text file, aggregates it across groups, and uses it to
//! keep proxies from asking their remote for paths it cannot have.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod prefix;
pub mod repository;
pub mod storage;

pub use config::schema::RouterConfig;
pub use error::{RoutingError, RoutingResult};
pub use filter::RequestAdmissionFilter;
pub use http::HttpServer;
pub use lifecycle::{Services, Shutdown};
pub use manager::Manager;
