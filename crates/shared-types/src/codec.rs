//! # Canonical Codec
//!
//! Every entity that is hashed, signed, or sent between nodes goes through the
//! options defined here: fixed-width little-endian integers, a decode size
//! limit, and rejection of trailing bytes. The same value always encodes to the
//! same bytes.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entities::{Batch, ContentHash, FileClaim, NodeId, Position, Request};
use crate::errors::{CodecError, CodecResult};

/// Upper bound for any single decoded value.
pub const MAX_DECODE_BYTES: u64 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_DECODE_BYTES)
        .with_little_endian()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encodes `value` with the canonical options.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decodes a complete value; trailing bytes are an error.
pub fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> CodecResult<T> {
    options()
        .deserialize(bytes)
        .map_err(|e| CodecError::Decode {
            what,
            reason: e.to_string(),
        })
}

impl Request {
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        decode("request", bytes)
    }
}

impl Batch {
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        decode("batch", bytes)
    }

    /// Builds a batch from requests, encoding each one.
    pub fn from_requests(requests: &[Request]) -> CodecResult<Self> {
        let requests = requests
            .iter()
            .map(Request::to_bytes)
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Self { requests })
    }

    /// Decodes every request, failing on the first malformed one.
    pub fn decode_requests(&self) -> CodecResult<Vec<Request>> {
        self.requests.iter().map(|r| Request::from_bytes(r)).collect()
    }
}

impl Position {
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        decode("position metadata", bytes)
    }
}

impl FileClaim {
    /// `64` hash bytes followed by the node id as `u64` little-endian.
    pub const ENCODED_LEN: usize = ContentHash::LEN + 8;

    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(Self::ENCODED_LEN);
        payload.extend_from_slice(self.hash.as_bytes());
        payload.extend_from_slice(&self.node.0.to_le_bytes());
        payload
    }

    pub fn from_payload(payload: &[u8]) -> CodecResult<Self> {
        if payload.len() != Self::ENCODED_LEN {
            return Err(CodecError::InvalidPayloadLength {
                expected: Self::ENCODED_LEN,
                actual: payload.len(),
            });
        }
        let (hash_bytes, node_bytes) = payload.split_at(ContentHash::LEN);
        let mut hash = [0u8; 64];
        hash.copy_from_slice(hash_bytes);
        let mut node = [0u8; 8];
        node.copy_from_slice(node_bytes);
        Ok(Self {
            hash: ContentHash(hash),
            node: NodeId(u64::from_le_bytes(node)),
        })
    }
}
