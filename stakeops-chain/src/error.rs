//! Chain facade error types.

use thiserror::Error;

/// Errors that can occur talking to the chain.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// No connection has been established
    #[error("Not connected to RPC endpoint")]
    NotConnected,

    /// Connecting to the RPC endpoint failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Transport-level RPC failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The contract call reverted
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// The transport timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Return value did not have the expected shape
    #[error("Unexpected return value from {method}: {detail}")]
    Decode {
        /// Method that was called
        method: String,
        /// What was wrong with the value
        detail: String,
    },

    /// Method does not exist on the target contract
    #[error("Unknown contract method: {0}")]
    UnknownMethod(String),

    /// Call arguments were missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Event subscription failure
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl ChainError {
    /// Short label used to tag error counters.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::NotConnected => "not_connected",
            ChainError::Connection(_) => "connection",
            ChainError::Rpc(_) => "rpc",
            ChainError::Reverted(_) => "reverted",
            ChainError::Timeout(_) => "timeout",
            ChainError::Decode { .. } => "decode",
            ChainError::UnknownMethod(_) => "unknown_method",
            ChainError::InvalidArgument(_) => "invalid_argument",
            ChainError::Subscription(_) => "subscription",
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
