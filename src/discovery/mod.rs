//! Discovery pipeline: computes a fresh prefix list for one repository.
//!
//! # Data Flow
//! ```text
//! hosted / local part of a proxy:
//!     local.rs  → ContentStore::walk(depth) → entries
//!
//! proxy remote:
//!     remote.rs → RemoteStrategy (in priority order)
//!                   1. prefix_file.rs   GET <remote>/.meta/prefixes.txt → codec
//!                   2. scrape/          S3 listing or HTML index crawl
//!               → DiscoveryResult (every outcome + the winning source)
//! ```
//!
//! # Design Decisions
//! - Strategies are a closed enum tried in a fixed order
//! - `StrategyFailed` is soft (next strategy); any other error is hard and
//!   ends the pipeline with the repository in error
//! - Outcomes keep the message shown to operators, so a failed run still
//!   explains itself

pub mod local;
pub mod prefix_file;
pub mod remote;
pub mod scrape;
pub mod transport;

pub use local::LocalContentDiscoverer;
pub use prefix_file::PrefixFileStrategy;
pub use remote::{RemoteContentDiscoverer, RemoteStrategy};
pub use scrape::ScrapeStrategy;
pub use transport::{Fetched, HttpTransport};

use crate::prefix::MemoryPrefixSource;

/// What a strategy produced when it succeeded.
#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub strategy_id: &'static str,
    pub message: String,
    pub prefix_source: MemoryPrefixSource,
}

/// One strategy's attempt, as recorded for the status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub strategy_id: String,
    pub successful: bool,
    pub message: String,
    /// The attempt ended with a hard error rather than a soft refusal.
    pub error: bool,
}

/// All outcomes of one discovery run, plus the source of the successful one.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    repository: String,
    outcomes: Vec<Outcome>,
    prefix_source: Option<MemoryPrefixSource>,
}

impl DiscoveryResult {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            outcomes: Vec::new(),
            prefix_source: None,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn record_success(&mut self, result: StrategyResult) {
        self.outcomes.push(Outcome {
            strategy_id: result.strategy_id.to_string(),
            successful: true,
            message: result.message,
            error: false,
        });
        self.prefix_source = Some(result.prefix_source);
    }

    pub fn record_failure(&mut self, strategy_id: &str, message: impl Into<String>) {
        self.push_unsuccessful(strategy_id, message.into(), false);
    }

    pub fn record_error(&mut self, strategy_id: &str, message: impl Into<String>) {
        self.push_unsuccessful(strategy_id, message.into(), true);
    }

    fn push_unsuccessful(&mut self, strategy_id: &str, message: String, error: bool) {
        self.outcomes.push(Outcome {
            strategy_id: strategy_id.to_string(),
            successful: false,
            message,
            error,
        });
        self.prefix_source = None;
    }

    /// The last recorded attempt succeeded.
    pub fn is_successful(&self) -> bool {
        self.last_outcome().is_some_and(|o| o.successful)
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.outcomes.last()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn prefix_source(&self) -> Option<&MemoryPrefixSource> {
        self.prefix_source.as_ref()
    }

    pub fn into_prefix_source(self) -> Option<MemoryPrefixSource> {
        self.prefix_source
    }
}
