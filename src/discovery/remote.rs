//! Remote content discovery: runs the remote strategies in priority order.

use crate::discovery::{DiscoveryResult, PrefixFileStrategy, ScrapeStrategy, StrategyResult};
use crate::error::{RoutingError, RoutingResult};
use crate::observability::metrics;
use crate::repository::Repository;

/// The fixed set of remote strategies.
#[derive(Debug, Clone)]
pub enum RemoteStrategy {
    PrefixFile(PrefixFileStrategy),
    Scrape(ScrapeStrategy),
}

impl RemoteStrategy {
    pub fn id(&self) -> &'static str {
        match self {
            RemoteStrategy::PrefixFile(_) => crate::discovery::prefix_file::STRATEGY_ID,
            RemoteStrategy::Scrape(_) => crate::discovery::scrape::STRATEGY_ID,
        }
    }

    pub async fn discover(&self, repository: &Repository) -> RoutingResult<StrategyResult> {
        match self {
            RemoteStrategy::PrefixFile(strategy) => strategy.discover(repository).await,
            RemoteStrategy::Scrape(strategy) => strategy.discover(repository).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteContentDiscoverer {
    strategies: Vec<RemoteStrategy>,
}

impl RemoteContentDiscoverer {
    /// Strategies are tried in the given order.
    pub fn new(strategies: Vec<RemoteStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[RemoteStrategy] {
        &self.strategies
    }

    pub async fn discover(&self, repository: &Repository) -> DiscoveryResult {
        self.discover_with(repository, &self.strategies).await
    }

    /// Run `strategies` until one succeeds or one fails hard.
    pub async fn discover_with(&self, repository: &Repository, strategies: &[RemoteStrategy]) -> DiscoveryResult {
        let mut result = DiscoveryResult::new(&repository.id);
        for strategy in strategies {
            let id = strategy.id();
            tracing::debug!(repository = %repository.id, strategy = id, "Remote discovery");
            match strategy.discover(repository).await {
                Ok(found) => {
                    tracing::debug!(repository = %repository.id, strategy = id, message = %found.message, "Remote strategy succeeded");
                    metrics::record_discovery(id, "success");
                    result.record_success(found);
                    break;
                }
                Err(RoutingError::StrategyFailed(message)) => {
                    tracing::debug!(repository = %repository.id, strategy = id, %message, "Remote strategy declined");
                    metrics::record_discovery(id, "failed");
                    result.record_failure(id, message);
                }
                Err(RoutingError::InvalidInput(message)) => {
                    tracing::warn!(repository = %repository.id, strategy = id, %message, "Remote strategy got invalid input");
                    metrics::record_discovery(id, "error");
                    result.record_error(
                        id,
                        format!("Remote strategy {} detected invalid input, results discarded: {}", id, message),
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(repository = %repository.id, strategy = id, error = %e, "Remote strategy failed");
                    metrics::record_discovery(id, "error");
                    result.record_error(id, format!("Remote strategy {} failed: {}", id, e));
                    break;
                }
            }
        }
        result
    }
}
