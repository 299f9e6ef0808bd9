//! # Error Types
//!
//! Errors raised while encoding or decoding shared entities.

use thiserror::Error;

/// Errors from the canonical codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Serialization failed (only possible when the size limit is exceeded).
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Bytes could not be decoded into the expected entity.
    #[error("Malformed {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A fixed-width request payload had the wrong size.
    #[error("Invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidPayloadLength { expected: usize, actual: usize },

    /// Hex text did not describe a 64-byte content hash.
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
