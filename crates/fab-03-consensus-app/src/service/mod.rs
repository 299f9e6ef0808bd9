//! Fabrication application service.
//!
//! # Architecture
//! - Stateless verification: every `verify_*` call only decodes and checks
//! - Serialized delivery: one async lock covers the whole `deliver` sequence,
//!   so organic delivery and sync replay never interleave
//! - Process-wide verification sequence held in an atomic

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fab_02_ledger::Ledger;
use shared_crypto::{NodeIdentity, SignedProposal, VerificationError};
use shared_types::{
    Batch, ConsenterSignature, Decision, LedgerRecord, MembershipChange, NodeId, Position,
    Proposal, Request, RequestInfo, SyncResponse,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::domain::errors::{AppError, AppResult};
use crate::ports::inbound::ConsensusApplication;
use crate::ports::outbound::{BlockSource, PeerDirectory};

/// Snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub node_id: NodeId,
    pub position: Position,
    pub verification_sequence: u64,
    pub records: usize,
    pub known_files: usize,
    pub nodes: Vec<NodeId>,
}

/// Dependencies for [`FabricationApp`].
pub struct AppDependencies {
    pub identity: NodeIdentity,
    pub ledger: Arc<Ledger>,
    pub peers: Arc<dyn PeerDirectory>,
    pub blocks: Arc<dyn BlockSource>,
    pub config: AppConfig,
}

struct DeliveryState {
    position: Position,
    last_decision: Decision,
}

/// The application a BFT engine drives.
pub struct FabricationApp {
    identity: NodeIdentity,
    ledger: Arc<Ledger>,
    peers: Arc<dyn PeerDirectory>,
    blocks: Arc<dyn BlockSource>,
    delivered: mpsc::Sender<LedgerRecord>,
    request_max_bytes: usize,
    verification_seq: AtomicU64,
    membership_changed: AtomicBool,
    delivery: Mutex<DeliveryState>,
}

impl FabricationApp {
    /// Creates the app and the receiving end of its delivery queue.
    pub fn new(deps: AppDependencies) -> (Self, mpsc::Receiver<LedgerRecord>) {
        let (delivered, records) = mpsc::channel(deps.config.delivery_queue.max(1));
        let app = Self {
            identity: deps.identity,
            ledger: deps.ledger,
            peers: deps.peers,
            blocks: deps.blocks,
            delivered,
            request_max_bytes: deps.config.request_max_bytes,
            verification_seq: AtomicU64::new(deps.config.initial_verification_sequence),
            membership_changed: AtomicBool::new(false),
            delivery: Mutex::new(DeliveryState {
                position: Position::default(),
                last_decision: Decision::default(),
            }),
        };
        (app, records)
    }

    pub fn node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Membership-change hook: installs a new verification sequence.
    pub fn set_verification_sequence(&self, sequence: u64) {
        let previous = self.verification_seq.swap(sequence, Ordering::SeqCst);
        info!(
            "[fab-03] Verification sequence {} -> {}",
            previous, sequence
        );
    }

    pub async fn last_decision(&self) -> Decision {
        self.delivery.lock().await.last_decision.clone()
    }

    pub async fn delivered_position(&self) -> Position {
        self.delivery.lock().await.position
    }

    pub async fn status(&self) -> AppStatus {
        let position = self.delivered_position().await;
        let ledger = self.ledger.status();
        AppStatus {
            node_id: self.node_id(),
            position,
            verification_sequence: self.verification_sequence(),
            records: ledger.records,
            known_files: ledger.known_files,
            nodes: self.peers.nodes(),
        }
    }

    fn decode_batch(payload: &[u8]) -> AppResult<Vec<Request>> {
        Batch::from_bytes(payload)
            .map_err(AppError::MalformedBatch)?
            .decode_requests()
            .map_err(AppError::MalformedRequest)
    }
}

#[async_trait]
impl ConsensusApplication for FabricationApp {
    fn assemble_proposal(&self, metadata: Vec<u8>, requests: Vec<Vec<u8>>) -> AppResult<Proposal> {
        let payload = Batch { requests }
            .to_bytes()
            .map_err(AppError::MalformedBatch)?;
        Ok(Proposal {
            payload,
            metadata,
            verification_sequence: self.verification_sequence(),
        })
    }

    fn verify_proposal(&self, proposal: &Proposal) -> AppResult<Vec<RequestInfo>> {
        Position::from_bytes(&proposal.metadata).map_err(AppError::InvalidProposalMetadata)?;
        let requests = Self::decode_batch(&proposal.payload)?;
        Ok(requests.iter().map(Request::info).collect())
    }

    fn requests_from_proposal(&self, proposal: &Proposal) -> Vec<RequestInfo> {
        match Self::decode_batch(&proposal.payload) {
            Ok(requests) => requests.iter().map(Request::info).collect(),
            Err(e) => {
                warn!("[fab-03] Proposal {} does not decode: {}", proposal.digest_hex(), e);
                Vec::new()
            }
        }
    }

    fn verify_request(&self, raw: &[u8]) -> AppResult<RequestInfo> {
        if raw.len() > self.request_max_bytes {
            return Err(AppError::RequestTooLarge {
                size: raw.len(),
                max: self.request_max_bytes,
            });
        }
        let request = Request::from_bytes(raw).map_err(AppError::MalformedRequest)?;
        if !request.is_supported() {
            return Err(AppError::UnsupportedRequest(request.request_type));
        }
        if let Some(change) = &request.reconfig {
            if change.nodes.is_empty() {
                return Err(AppError::InvalidReconfig("empty node set".into()));
            }
        }
        Ok(request.info())
    }

    fn request_id(&self, raw: &[u8]) -> AppResult<RequestInfo> {
        Request::from_bytes(raw)
            .map(|r| r.info())
            .map_err(AppError::MalformedRequest)
    }

    fn sign(&self, msg: &[u8]) -> AppResult<Vec<u8>> {
        self.identity
            .sign(msg)
            .map_err(|e| AppError::Signing(e.to_string()))
    }

    fn sign_proposal(
        &self,
        proposal: &Proposal,
        auxiliary_data: &[u8],
    ) -> AppResult<ConsenterSignature> {
        let peers = self.peers.nodes().len();
        if auxiliary_data.is_empty() && peers > 1 {
            error!(
                "[fab-03] Asked to sign proposal {} without prepare evidence",
                proposal.digest_hex()
            );
            return Err(AppError::MissingPrepareEvidence { peers });
        }

        let msg = SignedProposal {
            payload: proposal.digest().to_vec(),
            auxiliary_data: auxiliary_data.to_vec(),
        }
        .to_bytes()
        .map_err(|e| AppError::Signing(e.to_string()))?;
        let value = self.sign(&msg)?;

        Ok(ConsenterSignature {
            id: self.node_id(),
            value,
            msg,
        })
    }

    fn verify_consenter_signature(
        &self,
        signature: &ConsenterSignature,
        proposal: &Proposal,
    ) -> AppResult<Vec<u8>> {
        self.verify_signature(signature)?;
        let signed = SignedProposal::from_bytes(&signature.msg)?;
        if signed.payload != proposal.digest() {
            debug!(
                "[fab-03] Signature from node {} is for another proposal",
                signature.id
            );
            return Err(VerificationError::DigestMismatch.into());
        }
        Ok(signed.auxiliary_data)
    }

    fn verify_signature(&self, signature: &ConsenterSignature) -> AppResult<()> {
        self.identity
            .verifier()
            .verify(signature.id, &signature.msg, &signature.value)?;
        Ok(())
    }

    fn auxiliary_data(&self, msg: &[u8]) -> AppResult<Vec<u8>> {
        Ok(SignedProposal::from_bytes(msg)?.auxiliary_data)
    }

    fn verification_sequence(&self) -> u64 {
        self.verification_seq.load(Ordering::SeqCst)
    }

    fn membership_change(&self) -> bool {
        self.membership_changed.swap(false, Ordering::SeqCst)
    }

    async fn deliver(
        &self,
        proposal: Proposal,
        signatures: Vec<ConsenterSignature>,
    ) -> AppResult<Option<MembershipChange>> {
        let mut state = self.delivery.lock().await;

        let batch = Batch::from_bytes(&proposal.payload).map_err(AppError::MalformedCommittedBatch)?;
        let position = Position::from_bytes(&proposal.metadata).map_err(AppError::MalformedMetadata)?;
        if position.latest_sequence <= state.position.latest_sequence {
            error!(
                "[fab-03] 🛑 Committed sequence twice: had {}, got {}",
                state.position, position
            );
            return Err(AppError::DuplicateSequence {
                previous: state.position.latest_sequence,
                delivered: position.latest_sequence,
            });
        }

        let record = LedgerRecord {
            metadata: proposal.metadata.clone(),
            batch,
        };
        if !self.ledger.add(record.clone()).await? {
            warn!(
                "[fab-03] Ledger did not take {} (latest {}); delivering it without a log entry",
                position,
                self.ledger.latest_position()
            );
        }

        let reconfig = record
            .batch
            .requests
            .iter()
            .filter_map(|raw| Request::from_bytes(raw).ok())
            .filter_map(|request| request.reconfig)
            .last();

        state.position = position;
        state.last_decision = Decision {
            proposal,
            signatures,
        };

        self.delivered
            .send(record)
            .await
            .map_err(|_| AppError::DeliveryClosed)?;

        if let Some(change) = &reconfig {
            info!(
                "[fab-03] Membership change at {}: {} nodes",
                position,
                change.nodes.len()
            );
            self.membership_changed.store(true, Ordering::SeqCst);
        }
        debug!("[fab-03] Delivered {}", position);
        Ok(reconfig)
    }

    async fn sync(&self) -> AppResult<SyncResponse> {
        let from = self.delivered_position().await;
        let mut reconfig = None;

        match self.blocks.open_replay(from).await.map_err(AppError::SyncFailed)? {
            Some(mut replay) => {
                let source = replay.source();
                info!("[fab-03] Syncing from node {} after {}", source, from);
                let mut replayed = 0usize;
                while let Some(record) = replay.next_record().await.map_err(AppError::SyncFailed)? {
                    let proposal = Proposal {
                        payload: record.batch.to_bytes().map_err(AppError::MalformedBatch)?,
                        metadata: record.metadata,
                        verification_sequence: self.verification_sequence(),
                    };
                    if let Some(change) = self.deliver(proposal, Vec::new()).await? {
                        reconfig = Some(change);
                    }
                    replayed += 1;
                }
                info!("[fab-03] Replayed {} records from node {}", replayed, source);
            }
            None => debug!("[fab-03] No live peer to sync from"),
        }

        Ok(SyncResponse {
            latest: self.last_decision().await,
            reconfig,
        })
    }
}
