//! Decision oracle errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed decision: {0}")]
    MalformedDecision(String),
}
