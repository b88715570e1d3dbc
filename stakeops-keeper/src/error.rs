//! Keeper error types.

use thiserror::Error;

use stakeops_chain::ChainError;
use stakeops_domain::DomainError;

/// Errors that can occur while running keeper operations.
#[derive(Debug, Clone, Error)]
pub enum KeeperError {
    /// Chain read or write failed (after retries, for writes)
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Fetched values violate a domain invariant
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl KeeperError {
    /// Short label used as the `kind` dimension of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            KeeperError::Chain(e) => e.kind(),
            KeeperError::Domain(_) => "invariant",
            KeeperError::Metrics(_) => "metrics",
        }
    }
}

impl From<prometheus::Error> for KeeperError {
    fn from(e: prometheus::Error) -> Self {
        KeeperError::Metrics(e.to_string())
    }
}

/// Result type for keeper operations.
pub type KeeperResult<T> = Result<T, KeeperError>;
