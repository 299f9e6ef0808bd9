//! Transport error types.
//!
//! Every variant is recoverable: callers log and drop, or retry later.

use std::net::SocketAddr;

use shared_types::{CodecError, ContentHash, NodeId};
use thiserror::Error;

use super::messages::FailureKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("invalid transport configuration: {0}")]
    Config(String),

    #[error("invalid peer address {0:?}, expected id@host:port")]
    InvalidPeer(String),

    #[error("cannot resolve {address}: {reason}")]
    Resolve { address: String, reason: String },

    #[error("node {0} is not a known peer")]
    UnknownPeer(NodeId),

    #[error("dial to node {peer} failed: {reason}")]
    Connect { peer: NodeId, reason: String },

    #[error("dial to node {0} timed out")]
    ConnectTimeout(NodeId),

    #[error("not connected to node {0}")]
    NotConnected(NodeId),

    #[error("request to node {0} timed out")]
    RequestTimeout(NodeId),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("peer refused ({kind}): {message}")]
    Remote { kind: FailureKind, message: String },

    #[error("unexpected {0} response")]
    UnexpectedResponse(&'static str),

    #[error("peer closed the stream without replying")]
    NoResponse,

    #[error("downloaded content hashes to {actual}, expected {expected}")]
    ContentMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("inbound queue is already being served")]
    AlreadyServing,
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportError::Remote {
                kind: FailureKind::NotFound,
                ..
            }
        )
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
