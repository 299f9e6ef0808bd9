//! Inbound port: what the transport calls for each queued envelope.

use shared_types::NodeId;

/// Receives envelopes drained by [`crate::PeerTransport::serve`].
///
/// Calls are made one at a time from the dispatch loop, so a slow handler
/// delays every message behind it.
pub trait MessageHandler: Send + Sync {
    /// An opaque consensus engine message from `sender`.
    fn handle_message(&self, sender: NodeId, message: Vec<u8>);

    /// A client request `sender` forwarded to this node.
    fn handle_request(&self, sender: NodeId, request: Vec<u8>);
}
