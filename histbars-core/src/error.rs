//! Structured error types for client operations.
//!
//! Callers are expected to match on [`ClientError`] and decide between retry
//! and abort; the library itself never retries.

use thiserror::Error;

/// Errors surfaced by the data client.
///
/// Validation and timeout failures propagate unchanged. Anything else that
/// goes wrong during a fetch is wrapped into `DataRequest` with the original
/// message preserved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Handshake failed or timed out.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed request or unmet contract preconditions.
    #[error("validation error: {0}")]
    Validation(String),

    /// The data wait exceeded its budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Any other failure during the fetch exchange.
    #[error("data request failed: {0}")]
    DataRequest(String),
}

impl ClientError {
    /// The message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ClientError::Connection(m)
            | ClientError::Validation(m)
            | ClientError::Timeout(m)
            | ClientError::DataRequest(m) => m,
        }
    }
}
