//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or encoding protocol messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A line grew past the framing limit without a terminator
    #[error("Line too long: {len} bytes exceeds maximum of {max} bytes")]
    LineTooLong { len: usize, max: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
