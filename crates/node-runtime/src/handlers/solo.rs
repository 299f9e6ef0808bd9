//! Solo orderer.
//!
//! Stands in for the external BFT engine when a single node orders
//! everything: it admits submitted requests, and on every tick drives one
//! batch through the same adapter callbacks a real engine would use
//! (assemble, verify, sign, verify signature, deliver).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fab_03_consensus_app::{AppError, AppResult, ConsensusApplication, FabricationApp};
use fab_04_peer_transport::MessageHandler;
use parking_lot::Mutex;
use shared_types::{NodeId, Position, RequestInfo};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct SoloOrderer {
    app: Arc<FabricationApp>,
    pending: Mutex<VecDeque<Vec<u8>>>,
    max_batch: usize,
}

impl SoloOrderer {
    pub fn new(app: Arc<FabricationApp>, max_batch: usize) -> Self {
        Self {
            app,
            pending: Mutex::new(VecDeque::new()),
            max_batch: max_batch.max(1),
        }
    }

    /// Admits an encoded request for the next batch.
    pub fn submit(&self, raw: Vec<u8>) -> AppResult<RequestInfo> {
        let info = self.app.verify_request(&raw)?;
        self.pending.lock().push_back(raw);
        debug!("[fab-node] Queued request {}", info);
        Ok(info)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Orders and delivers one batch. `Ok(None)` when nothing is pending.
    ///
    /// A failed batch is not re-queued; its request ids are logged.
    pub async fn order_next(&self) -> AppResult<Option<Position>> {
        let requests: Vec<Vec<u8>> = {
            let mut pending = self.pending.lock();
            let take = pending.len().min(self.max_batch);
            pending.drain(..take).collect()
        };
        if requests.is_empty() {
            return Ok(None);
        }

        let ids = self.request_ids(&requests);
        match self.order(requests).await {
            Ok(position) => Ok(Some(position)),
            Err(e) => {
                if !e.is_fatal() {
                    warn!(
                        "[fab-node] Dropping {} requests [{}]: {}",
                        ids.len(),
                        ids.join(", "),
                        e
                    );
                }
                Err(e)
            }
        }
    }

    fn request_ids(&self, requests: &[Vec<u8>]) -> Vec<String> {
        requests
            .iter()
            .map(|raw| match self.app.request_id(raw) {
                Ok(info) => info.to_string(),
                Err(_) => format!("<{} undecodable bytes>", raw.len()),
            })
            .collect()
    }

    async fn order(&self, requests: Vec<Vec<u8>>) -> AppResult<Position> {
        let position = self.app.delivered_position().await.next();
        let metadata = position.to_bytes().map_err(AppError::MalformedMetadata)?;
        let proposal = self.app.assemble_proposal(metadata, requests)?;
        let infos = self.app.verify_proposal(&proposal)?;

        // Alone, this node's own prepare is the whole quorum's evidence.
        let evidence = proposal.digest().to_vec();
        let signature = self.app.sign_proposal(&proposal, &evidence)?;
        self.app.verify_consenter_signature(&signature, &proposal)?;

        if let Some(change) = self.app.deliver(proposal, vec![signature]).await? {
            if self.app.membership_change() {
                let sequence = self.app.verification_sequence() + 1;
                self.app.set_verification_sequence(sequence);
                info!(
                    "[fab-node] Membership now {:?} at verification sequence {}",
                    change.nodes, sequence
                );
            }
        }
        debug!("[fab-node] Ordered {} requests at {}", infos.len(), position);
        Ok(position)
    }

    /// Orders one batch per tick until shutdown. Returns only fatal errors.
    pub async fn run(
        self: Arc<Self>,
        tick: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("[fab-node] Solo orderer running every {:?}", tick);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            match self.order_next().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!("[fab-node] 🛑 Solo orderer halted: {}", e);
                    return Err(e);
                }
                // order_next logged the dropped request ids.
                Err(_) => {}
            }
        }
        info!("[fab-node] Solo orderer stopped");
        Ok(())
    }
}

impl MessageHandler for SoloOrderer {
    fn handle_message(&self, sender: NodeId, message: Vec<u8>) {
        debug!(
            "[fab-node] Ignoring {}-byte consensus message from node {} in solo mode",
            message.len(),
            sender
        );
    }

    fn handle_request(&self, sender: NodeId, request: Vec<u8>) {
        match self.submit(request) {
            Ok(info) => debug!("[fab-node] Node {} forwarded {}", sender, info),
            Err(e) => warn!(
                "[fab-node] Rejected request forwarded by node {}: {}",
                sender, e
            ),
        }
    }
}
