//! Replay of committed records over `FetchBlocks`.

use std::sync::Arc;

use async_trait::async_trait;
use fab_03_consensus_app::{BlockSource, RecordReplay};
use fab_04_peer_transport::{PeerTransport, RecordStream};
use shared_types::{LedgerRecord, NodeId, Position};
use tracing::debug;

/// Opens replays from the lowest-numbered live peer.
pub struct TransportBlockSource {
    transport: Arc<PeerTransport>,
}

impl TransportBlockSource {
    pub fn new(transport: Arc<PeerTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl BlockSource for TransportBlockSource {
    async fn open_replay(&self, from: Position) -> Result<Option<Box<dyn RecordReplay>>, String> {
        let Some(peer) = self.transport.live_peer() else {
            return Ok(None);
        };
        debug!("[fab-node] Opening replay after {} from node {}", from, peer);
        let stream = self
            .transport
            .fetch_blocks(peer, from)
            .await
            .map_err(|e| format!("fetch from node {peer}: {e}"))?;
        Ok(Some(Box::new(TransportReplay { stream })))
    }
}

struct TransportReplay {
    stream: RecordStream,
}

#[async_trait]
impl RecordReplay for TransportReplay {
    fn source(&self) -> NodeId {
        self.stream.source()
    }

    async fn next_record(&mut self) -> Result<Option<LedgerRecord>, String> {
        self.stream.next().await.map_err(|e| e.to_string())
    }
}
