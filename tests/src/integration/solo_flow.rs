//! # Forwarded Requests
//!
//! Followers verify client requests locally and forward them to the solo
//! orderer, which alone decides their order.

#[cfg(test)]
mod tests {
    use fab_03_consensus_app::AppError;
    use fab_04_peer_transport::EnvelopePayload;
    use node_runtime::NodeError;
    use shared_crypto::test_utils::TestPki;
    use shared_types::{ContentHash, MembershipChange, NodeId, Request, RequestType};

    use crate::integration::harness::{eventually, follower, solo};

    #[tokio::test]
    async fn test_request_submitted_to_follower_is_ordered_by_leader() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;

        let (hash, info) = node.add_file(b"valve seat").await.unwrap();
        assert_eq!(info.client_id, NodeId(2).common_name());

        let leader_ledger = leader.ledger().clone();
        eventually(|| leader_ledger.file_origin(&hash) == Some(NodeId(2))).await;
        let ledger = node.ledger().clone();
        eventually(|| ledger.file_origin(&hash) == Some(NodeId(2))).await;

        // The leader downloads from the origin named in its own ledger.
        let transport = leader.transport();
        transport.add_peer(node.advertised_peer("127.0.0.1").unwrap());
        assert!(transport.connect(NodeId(2)).await);
        assert_eq!(leader.fetch_content(hash).await.unwrap(), b"valve seat");

        node.shutdown();
        leader.shutdown();
    }

    #[tokio::test]
    async fn test_reserved_request_types_rejected_before_forwarding() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;

        for request_type in [RequestType::AnnounceFabrication, RequestType::CancelFabrication] {
            let mut request = Request::add_file("api", "7", ContentHash::of(b"x"), NodeId(2));
            request.request_type = request_type;
            let err = node.submit(&request).await.unwrap_err();
            assert!(matches!(
                err,
                NodeError::App(AppError::UnsupportedRequest(t)) if t == request_type
            ));
        }

        let empty = Request::membership_change(
            "admin",
            "8",
            MembershipChange {
                nodes: Vec::new(),
                config: Vec::new(),
            },
        );
        assert!(matches!(
            node.submit(&empty).await.unwrap_err(),
            NodeError::App(AppError::InvalidReconfig(_))
        ));

        assert_eq!(leader.orderer().unwrap().pending(), 0);
        node.shutdown();
        leader.shutdown();
    }

    #[tokio::test]
    async fn test_leader_drops_malformed_forwarded_request() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;

        node.transport()
            .try_send(NodeId(1), EnvelopePayload::ForwardedRequest(vec![0xde, 0xad]))
            .await
            .unwrap();

        // Ordered after the garbage on the same link.
        let (hash, _) = node.add_file(b"spacer").await.unwrap();
        let leader_ledger = leader.ledger().clone();
        eventually(|| leader_ledger.file_origin(&hash).is_some()).await;
        assert_eq!(leader_ledger.record_count(), 1);

        node.shutdown();
        leader.shutdown();
    }

    #[tokio::test]
    async fn test_follower_without_leader_cannot_forward() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;
        leader.shutdown();

        let transport = node.transport().clone();
        eventually(|| transport.live_peer().is_none()).await;

        let request = Request::allow_fabrication("api", "9", ContentHash::of(b"y"), NodeId(2), 1);
        assert!(matches!(
            node.submit(&request).await.unwrap_err(),
            NodeError::NoLivePeer
        ));
        node.shutdown();
    }
}
