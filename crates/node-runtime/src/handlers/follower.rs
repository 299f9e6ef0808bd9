//! Follower mode: catch up from a live peer on every tick.

use std::sync::Arc;
use std::time::Duration;

use fab_03_consensus_app::{AppResult, ConsensusApplication, FabricationApp};
use fab_04_peer_transport::MessageHandler;
use shared_types::NodeId;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Calls `sync` every `tick` until shutdown. Returns only fatal errors.
pub async fn run_follower(
    app: Arc<FabricationApp>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("[fab-node] Following peers every {:?}", tick);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }
        match app.sync().await {
            Ok(response) => debug!(
                "[fab-node] Synced; last decision carries {} signatures",
                response.latest.signatures.len()
            ),
            Err(e) if e.is_fatal() => {
                error!("[fab-node] 🛑 Replication halted: {}", e);
                return Err(e);
            }
            Err(e) => warn!("[fab-node] Sync failed: {}", e),
        }
    }
    info!("[fab-node] Follower stopped");
    Ok(())
}

/// Inbound handler for followers, which order nothing themselves.
pub struct FollowerHandler;

impl MessageHandler for FollowerHandler {
    fn handle_message(&self, sender: NodeId, message: Vec<u8>) {
        debug!(
            "[fab-node] No consensus engine for {}-byte message from node {}",
            message.len(),
            sender
        );
    }

    fn handle_request(&self, sender: NodeId, _request: Vec<u8>) {
        warn!(
            "[fab-node] Node {} forwarded a request to a follower; dropped",
            sender
        );
    }
}
