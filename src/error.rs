//! Error kinds of the routing subsystem.
//!
//! # Severity
//! - `InvalidInput`, `Transport`, `Io`: hard failures. A discovery cycle that
//!   hits one stops and the repository enters `ERROR`.
//! - `StrategyFailed`: soft. The pipeline moves on to the next strategy.
//! - `NotApplicable`: discovery was never attempted (group, blocked, out of
//!   service). Not an error from the operator's point of view.

use thiserror::Error;

/// Errors raised by prefix codecs, discovery strategies and the manager.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Malformed, oversized, non-ASCII or otherwise garbled prefix content.
    #[error("{0}")]
    InvalidInput(String),

    /// A single strategy declined to run.
    #[error("{0}")]
    StrategyFailed(String),

    /// Connection failure, timeout or unexpected HTTP status.
    #[error("{0}")]
    Transport(String),

    /// Repository is not in a state (or of a kind) that can be discovered.
    #[error("{0}")]
    NotApplicable(String),

    /// Local storage failure while reading or writing a prefix source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository id not known to the registry.
    #[error("Unknown repository '{0}'")]
    UnknownRepository(String),
}

impl RoutingError {
    /// Build a transport error from any error, keeping its whole source chain.
    ///
    /// HTTP clients tend to hide the OS-level cause ("Connection refused")
    /// a few levels down, operators need to see it.
    pub fn transport(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        RoutingError::Transport(message)
    }
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_transport_keeps_cause_chain() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        let routing = RoutingError::transport(&err);
        let text = routing.to_string();
        assert!(text.starts_with("error sending request"));
        assert!(text.contains("refused"));
    }
}
