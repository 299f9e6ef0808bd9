//! Error types for the consensus application.

use fab_02_ledger::LedgerError;
use shared_crypto::VerificationError;
use shared_types::{CodecError, RequestType};

/// Consensus application errors.
///
/// Variants reported by [`AppError::is_fatal`] mean local state can no longer
/// be trusted to match the rest of the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("Malformed batch: {0}")]
    MalformedBatch(CodecError),

    #[error("Malformed request: {0}")]
    MalformedRequest(CodecError),

    #[error("Malformed proposal metadata: {0}")]
    InvalidProposalMetadata(CodecError),

    #[error("{0} requests are not accepted")]
    UnsupportedRequest(RequestType),

    #[error("Request of {size} bytes exceeds the {max}-byte limit")]
    RequestTooLarge { size: usize, max: usize },

    #[error("Invalid membership change: {0}")]
    InvalidReconfig(String),

    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    // --- fatal ---
    #[error("Committed sequence twice: previous {previous}, delivered {delivered}")]
    DuplicateSequence { previous: u64, delivered: u64 },

    #[error("Committed proposal has malformed metadata: {0}")]
    MalformedMetadata(CodecError),

    #[error("Committed proposal has malformed batch: {0}")]
    MalformedCommittedBatch(CodecError),

    #[error("Signing a proposal without prepare evidence in a {peers}-node network")]
    MissingPrepareEvidence { peers: usize },

    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Delivery queue closed")]
    DeliveryClosed,
}

impl AppError {
    /// Whether the node must halt instead of continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSequence { .. }
                | Self::MalformedMetadata(_)
                | Self::MalformedCommittedBatch(_)
                | Self::MissingPrepareEvidence { .. }
                | Self::Ledger(_)
                | Self::DeliveryClosed
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
