//! Wire messages exchanged between peers.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::{ContentHash, LedgerRecord, NodeId, Position};

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopePayload {
    /// Opaque consensus engine message.
    Consensus(Vec<u8>),
    /// Encoded client request forwarded to another node.
    ForwardedRequest(Vec<u8>),
}

/// A message tagged with the sending node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEnvelope {
    pub sender: NodeId,
    pub payload: EnvelopePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcRequest {
    Consensus(PeerEnvelope),
    FetchBlocks(Position),
    DownloadContent(ContentHash),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcResponse {
    Ack,
    Record(LedgerRecord),
    Chunk(Vec<u8>),
    Failure { kind: FailureKind, message: String },
}

impl RpcResponse {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        RpcResponse::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RpcResponse::Ack => "ack",
            RpcResponse::Record(_) => "record",
            RpcResponse::Chunk(_) => "chunk",
            RpcResponse::Failure { .. } => "failure",
        }
    }
}

/// Why a peer refused an RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NotFound,
    /// The envelope claims to come from the receiving node itself.
    Loopback,
    /// The envelope sender differs from the TLS certificate identity.
    IdentityMismatch,
    /// The receiver is shutting down.
    Unavailable,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NotFound => "not found",
            FailureKind::Loopback => "loopback",
            FailureKind::IdentityMismatch => "identity mismatch",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
