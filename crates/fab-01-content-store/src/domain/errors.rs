use shared_types::ContentHash;
use thiserror::Error;

/// Content store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob is stored under this hash.
    #[error("Content not found: {0}")]
    NotFound(ContentHash),

    /// Backend I/O failure.
    #[error("Storage I/O error during {operation}: {message}")]
    Io { operation: &'static str, message: String },

    /// The store location could not be interpreted.
    #[error("Invalid store location '{0}': expected mem:// or file:///path")]
    InvalidLocation(String),
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, err: std::io::Error) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
