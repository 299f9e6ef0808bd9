//! # Follower Replication
//!
//! A follower catches up from the solo orderer over `FetchBlocks` and must
//! end with the same commit log and the same aggregate indices.

#[cfg(test)]
mod tests {
    use fab_01_content_store::ContentStore;
    use shared_crypto::test_utils::TestPki;
    use shared_types::NodeId;

    use crate::integration::harness::{eventually, follower, solo, within};

    #[tokio::test]
    async fn test_follower_replays_committed_records() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;

        let (hash, _) = leader.add_file(b"impeller housing").await.unwrap();
        leader
            .allow_fabrication(hash, &[NodeId(2), NodeId(3)], 5)
            .await
            .unwrap();
        let leader_ledger = leader.ledger().clone();
        eventually(|| leader_ledger.remaining(&hash, NodeId(3)) == 5).await;

        let node = follower(&pki, 2, &leader).await;
        let ledger = node.ledger().clone();
        eventually(|| ledger.latest_position() == leader_ledger.latest_position()).await;
        within(ledger.wait_for_aggregation(leader_ledger.latest_position()))
            .await
            .unwrap();

        assert_eq!(ledger.record_count(), leader_ledger.record_count());
        assert_eq!(ledger.snapshot(), leader_ledger.snapshot());
        assert_eq!(ledger.file_origin(&hash), Some(NodeId(1)));
        assert_eq!(ledger.remaining(&hash, NodeId(2)), 5);

        let monitor = node.monitor().clone();
        eventually(|| monitor.requests() == 3).await;

        node.shutdown();
        leader.shutdown();
    }

    #[tokio::test]
    async fn test_follower_keeps_up_with_new_batches() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;

        let (hash, _) = leader.add_file(b"gear blank").await.unwrap();
        let ledger = node.ledger().clone();
        eventually(|| ledger.file_origin(&hash) == Some(NodeId(1))).await;

        leader.allow_fabrication(hash, &[NodeId(2)], 1).await.unwrap();
        leader.allow_fabrication(hash, &[NodeId(2)], 2).await.unwrap();
        eventually(|| ledger.remaining(&hash, NodeId(2)) == 3).await;

        let status = node.status().await;
        assert_eq!(status.node_id, NodeId(2));
        assert_eq!(status.known_files, 1);

        node.shutdown();
        leader.shutdown();
    }

    #[tokio::test]
    async fn test_follower_downloads_content_from_origin() {
        let pki = TestPki::new();
        let leader = solo(&pki, 1).await;
        let node = follower(&pki, 2, &leader).await;

        let content: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
        let (hash, _) = leader.add_file(&content).await.unwrap();
        let ledger = node.ledger().clone();
        eventually(|| ledger.file_origin(&hash) == Some(NodeId(1))).await;

        assert!(!node.store().contains(&hash).unwrap());
        let fetched = within(node.fetch_content(hash)).await.unwrap();
        assert_eq!(fetched, content);
        assert!(node.store().contains(&hash).unwrap());

        node.shutdown();
        leader.shutdown();
    }
}
