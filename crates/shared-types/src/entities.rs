//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`, `ContentHash`
//! - **Requests**: `Request`, `RequestType`, `FileClaim`, `MembershipChange`, `RequestInfo`
//! - **Ordering**: `Batch`, `Position`, `LedgerRecord`
//! - **Consensus**: `Proposal`, `ConsenterSignature`, `Decision`, `SyncResponse`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha3::{Digest, Sha3_256, Sha3_512};

use crate::errors::CodecError;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Participant identifier, stable for the lifetime of the network.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Certificate common name bound to this node (`node{id}`).
    pub fn common_name(&self) -> String {
        format!("node{}", self.0)
    }

    /// Parses a certificate common name. Only the exact `node{id}` spelling is
    /// accepted, so `node07` does not alias `node7`.
    pub fn from_common_name(cn: &str) -> Option<Self> {
        let id = NodeId(cn.strip_prefix("node")?.parse().ok()?);
        (id.common_name() == cn).then_some(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA3-512 digest of file bytes; the only key into the content store.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(#[serde_as(as = "Bytes")] pub [u8; 64]);

impl ContentHash {
    /// Length of the digest in bytes.
    pub const LEN: usize = 64;

    /// Digest of `data`.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha3_512::digest(data);
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex, also used as the on-disk file name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", &self.to_hex()[..16])
    }
}

impl FromStr for ContentHash {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CodecError::InvalidHash(e.to_string()))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
            CodecError::InvalidHash(format!("expected 64 bytes, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }
}

// =============================================================================
// CLUSTER B: REQUESTS
// =============================================================================

/// Kind of client request carried in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Membership and other system traffic; no aggregation effect.
    SystemReserved,
    /// Registers a file and its originating node.
    AddFile,
    /// Grants a node a number of parts it may fabricate from a file.
    AllowFabrication,
    /// Reserved. Not implemented.
    AnnounceFabrication,
    /// Reserved. Not implemented.
    CancelFabrication,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SystemReserved => "SystemReserved",
            Self::AddFile => "AddFile",
            Self::AllowFabrication => "AllowFabrication",
            Self::AnnounceFabrication => "AnnounceFabrication",
            Self::CancelFabrication => "CancelFabrication",
        };
        f.write_str(name)
    }
}

/// New membership proposed through a `SystemReserved` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    /// Complete node set after the change.
    pub nodes: Vec<NodeId>,
    /// Engine-specific configuration, opaque to this layer.
    pub config: Vec<u8>,
}

/// A client request. Built once, encoded once, submitted once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub client_id: String,
    /// Unique request identifier.
    pub id: String,
    pub request_type: RequestType,
    /// Type-specific payload, see [`FileClaim`].
    pub payload: Vec<u8>,
    /// Parts authorized for `AllowFabrication`; zero otherwise.
    pub count: u64,
    pub reconfig: Option<MembershipChange>,
}

impl Request {
    pub fn add_file(
        client_id: impl Into<String>,
        id: impl Into<String>,
        hash: ContentHash,
        origin: NodeId,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            id: id.into(),
            request_type: RequestType::AddFile,
            payload: FileClaim { hash, node: origin }.to_payload(),
            count: 0,
            reconfig: None,
        }
    }

    pub fn allow_fabrication(
        client_id: impl Into<String>,
        id: impl Into<String>,
        hash: ContentHash,
        node: NodeId,
        count: u64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            id: id.into(),
            request_type: RequestType::AllowFabrication,
            payload: FileClaim { hash, node }.to_payload(),
            count,
            reconfig: None,
        }
    }

    pub fn membership_change(
        client_id: impl Into<String>,
        id: impl Into<String>,
        change: MembershipChange,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            id: id.into(),
            request_type: RequestType::SystemReserved,
            payload: Vec::new(),
            count: 0,
            reconfig: Some(change),
        }
    }

    pub fn info(&self) -> RequestInfo {
        RequestInfo {
            client_id: self.client_id.clone(),
            id: self.id.clone(),
        }
    }

    /// Whether aggregation can process this request type.
    pub fn is_supported(&self) -> bool {
        !matches!(
            self.request_type,
            RequestType::AnnounceFabrication | RequestType::CancelFabrication
        )
    }
}

/// `ContentHash ‖ NodeId` payload shared by `AddFile` (origin) and
/// `AllowFabrication` (allowed node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileClaim {
    pub hash: ContentHash,
    pub node: NodeId,
}

/// Identifies a request to the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestInfo {
    pub client_id: String,
    pub id: String,
}

impl fmt::Display for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.id)
    }
}

// =============================================================================
// CLUSTER C: ORDERING
// =============================================================================

/// Ordered raw encoded requests; the payload of a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub requests: Vec<Vec<u8>>,
}

/// Point in the commit history.
///
/// Field order makes the derived `Ord` lexicographic: a position is after
/// another when its view is greater, or the view is equal and its sequence is
/// greater.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub view_id: u64,
    pub latest_sequence: u64,
}

impl Position {
    pub fn new(view_id: u64, latest_sequence: u64) -> Self {
        Self {
            view_id,
            latest_sequence,
        }
    }

    /// Next sequence within the same view. Saturates at `u64::MAX`, so an
    /// exhausted sequence repeats and delivery rejects it as a duplicate.
    pub fn next(&self) -> Self {
        Self::new(self.view_id, self.latest_sequence.saturating_add(1))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view={} seq={}", self.view_id, self.latest_sequence)
    }
}

/// One committed entry of the ledger. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Encoded [`Position`].
    pub metadata: Vec<u8>,
    pub batch: Batch,
}

// =============================================================================
// CLUSTER D: CONSENSUS
// =============================================================================

/// The consensus engine's unit of agreement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Encoded [`Batch`].
    pub payload: Vec<u8>,
    /// Encoded [`Position`].
    pub metadata: Vec<u8>,
    pub verification_sequence: u64,
}

impl Proposal {
    /// SHA3-256 over the verification sequence and the length-prefixed
    /// metadata and payload. Identical on every node for identical proposals.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(self.verification_sequence.to_le_bytes());
        hasher.update((self.metadata.len() as u64).to_le_bytes());
        hasher.update(&self.metadata);
        hasher.update((self.payload.len() as u64).to_le_bytes());
        hasher.update(&self.payload);
        hasher.finalize().into()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

/// A signature produced by a consenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsenterSignature {
    pub id: NodeId,
    /// Encoded signature envelope.
    pub value: Vec<u8>,
    /// The signed message.
    pub msg: Vec<u8>,
}

/// A committed proposal with the signatures that finalized it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub proposal: Proposal,
    pub signatures: Vec<ConsenterSignature>,
}

/// Result of a catch-up round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub latest: Decision,
    pub reconfig: Option<MembershipChange>,
}
