//! Cross-node integration flows.
//!
//! Every node here runs the real stack: QUIC transport with mutual TLS,
//! the ledger aggregator and the consensus application, over loopback.

mod replication;
mod solo_flow;

#[cfg(test)]
pub(crate) mod harness {
    use std::future::Future;
    use std::time::Duration;

    use node_runtime::{FabricationNode, NodeConfig, NodeMode};
    use shared_crypto::test_utils::TestPki;
    use shared_types::NodeId;

    pub async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    pub async fn within<F: Future>(future: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(10), future)
            .await
            .expect("timed out")
    }

    pub async fn solo(pki: &TestPki, id: u32) -> FabricationNode {
        let id = NodeId(id.into());
        FabricationNode::start_with_identity(NodeConfig::for_testing(id, "unused"), pki.identity(id))
            .await
            .expect("solo node failed to start")
    }

    /// A follower of `leader`, already connected to it.
    pub async fn follower(pki: &TestPki, id: u32, leader: &FabricationNode) -> FabricationNode {
        let id = NodeId(id.into());
        let mut config = NodeConfig::for_testing(id, "unused");
        config.mode = NodeMode::Follower;
        config.peers = vec![leader
            .advertised_peer("127.0.0.1")
            .expect("leader is not listening")
            .to_string()];

        let node = FabricationNode::start_with_identity(config, pki.identity(id))
            .await
            .expect("follower failed to start");
        let transport = node.transport().clone();
        let leader = leader.node_id();
        eventually(|| transport.is_connected(leader)).await;
        node
    }
}
