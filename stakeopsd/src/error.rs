//! Daemon error types.

use stakeops_chain::ChainError;
use stakeops_domain::DomainError;
use stakeops_keeper::KeeperError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Chain error outside a keeper operation (e.g. startup connect)
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Keeper operation failed
    #[error("Keeper error: {0}")]
    Keeper(#[from] KeeperError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Health/metrics server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
