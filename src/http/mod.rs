//! HTTP surface of the routing service.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, timeout)
//!     → GET /repositories/{id}/.meta/prefixes.txt   stored prefix file
//!     → /admin/*                                     admin API (bearer auth)
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
