//! Callback surface consumed by the external BFT engine.

use async_trait::async_trait;
use shared_types::{ConsenterSignature, MembershipChange, Proposal, RequestInfo, SyncResponse};

use crate::domain::errors::AppResult;

/// Application callbacks required by a BFT consensus engine.
///
/// Verification methods are pure and may be called any number of times for
/// the same input. The engine calls `deliver` for one proposal at a time.
#[async_trait]
pub trait ConsensusApplication: Send + Sync {
    /// Wraps `requests` into a proposal at `metadata` with the current
    /// verification sequence.
    fn assemble_proposal(&self, metadata: Vec<u8>, requests: Vec<Vec<u8>>) -> AppResult<Proposal>;

    /// Decodes the batch and reports every request in it.
    fn verify_proposal(&self, proposal: &Proposal) -> AppResult<Vec<RequestInfo>>;

    /// Requests contained in `proposal`; empty if it does not decode.
    fn requests_from_proposal(&self, proposal: &Proposal) -> Vec<RequestInfo>;

    /// Admission check for a single client request.
    fn verify_request(&self, raw: &[u8]) -> AppResult<RequestInfo>;

    /// Identity of a request without admission checks.
    fn request_id(&self, raw: &[u8]) -> AppResult<RequestInfo>;

    /// Signs arbitrary bytes with this node's identity.
    fn sign(&self, msg: &[u8]) -> AppResult<Vec<u8>>;

    /// Signs the proposal digest together with prepare evidence.
    fn sign_proposal(&self, proposal: &Proposal, auxiliary_data: &[u8])
        -> AppResult<ConsenterSignature>;

    /// Verifies a consenter's proposal signature; returns its auxiliary data.
    fn verify_consenter_signature(
        &self,
        signature: &ConsenterSignature,
        proposal: &Proposal,
    ) -> AppResult<Vec<u8>>;

    /// Verifies a signature over arbitrary bytes.
    fn verify_signature(&self, signature: &ConsenterSignature) -> AppResult<()>;

    /// Auxiliary data carried in a proposal signature message.
    fn auxiliary_data(&self, msg: &[u8]) -> AppResult<Vec<u8>>;

    fn verification_sequence(&self) -> u64;

    /// Whether a membership change was delivered since the last call.
    fn membership_change(&self) -> bool;

    /// Commits a decided proposal.
    async fn deliver(
        &self,
        proposal: Proposal,
        signatures: Vec<ConsenterSignature>,
    ) -> AppResult<Option<MembershipChange>>;

    /// Catches up from a live peer.
    async fn sync(&self) -> AppResult<SyncResponse>;
}
