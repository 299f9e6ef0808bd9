//! Outbound ports: what the consensus application needs from the network.

use async_trait::async_trait;
use shared_types::{LedgerRecord, NodeId, Position};

/// Current membership as seen by the transport.
pub trait PeerDirectory: Send + Sync {
    /// All known node ids including this node, ascending.
    fn nodes(&self) -> Vec<NodeId>;
}

/// Source of committed records held by other nodes.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Opens a replay of records after `from` from some live peer other than
    /// this node. `Ok(None)` when no such peer is reachable.
    async fn open_replay(&self, from: Position) -> Result<Option<Box<dyn RecordReplay>>, String>;
}

/// A stream of replayed records, in commit order.
#[async_trait]
pub trait RecordReplay: Send {
    /// Node serving the replay.
    fn source(&self) -> NodeId;

    /// Next record, or `None` once the peer has sent everything.
    async fn next_record(&mut self) -> Result<Option<LedgerRecord>, String>;
}
