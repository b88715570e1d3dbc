//! Error types for alert delivery.

use thiserror::Error;

/// Errors raised by a single channel delivery.
///
/// These never escape the dispatcher; they are logged per channel.
#[derive(Debug, Clone, Error)]
pub enum AlertError {
    /// Payload could not be serialized
    #[error("Failed to serialize payload: {0}")]
    Serialization(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Endpoint answered with a non-success status
    #[error("Endpoint returned HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

/// Result type for channel deliveries.
pub type AlertResult<T> = Result<T, AlertError>;
