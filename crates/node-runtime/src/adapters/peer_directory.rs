//! Membership as the transport knows it.

use std::sync::Arc;

use fab_03_consensus_app::PeerDirectory;
use fab_04_peer_transport::PeerTransport;
use shared_types::NodeId;

pub struct TransportPeerDirectory {
    transport: Arc<PeerTransport>,
}

impl TransportPeerDirectory {
    pub fn new(transport: Arc<PeerTransport>) -> Self {
        Self { transport }
    }
}

impl PeerDirectory for TransportPeerDirectory {
    fn nodes(&self) -> Vec<NodeId> {
        self.transport.nodes()
    }
}
