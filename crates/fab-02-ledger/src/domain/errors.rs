//! Error types for the ledger subsystem.

use shared_types::{CodecError, ContentHash, NodeId, RequestType};

/// Errors returned to callers of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Malformed record metadata: {0}")]
    MalformedMetadata(CodecError),

    #[error("Aggregation worker has stopped")]
    AggregatorStopped,
}

/// Why a single committed request could not be aggregated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("Undecodable request: {0}")]
    MalformedRequest(CodecError),

    #[error("Malformed {request_type} payload: {reason}")]
    MalformedPayload {
        request_type: RequestType,
        reason: CodecError,
    },

    #[error("{0} is not implemented")]
    NotImplemented(RequestType),

    #[error("File {hash} already registered to node {existing}, node {claimed} claimed it")]
    OriginConflict {
        hash: ContentHash,
        existing: NodeId,
        claimed: NodeId,
    },

    #[error("Allowance overflow for file {hash}, node {node}")]
    AllowanceOverflow { hash: ContentHash, node: NodeId },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
