//! Protocol-level errors.

use thiserror::Error;

/// Errors raised while framing or interpreting protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("malformed reply line: {0:?}")]
    InvalidReply(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
