//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → registry (repositories) → manager + admission filter
//!     → manager startup (announce files, periodic updater)
//!
//! Reload:
//!     watcher → Services::reload → registry diff → repository events
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → HTTP drain, jobs cancelled
//! ```
//!
//! # Design Decisions
//! - Repositories are registered before the manager starts, so the first
//!   periodic pass sees all of them
//! - Routing limits and depths are fixed for the process lifetime

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::Services;
