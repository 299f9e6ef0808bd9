//! Outbound port: peer discovery.

use tokio::sync::mpsc;

use crate::domain::peer::Peer;

/// Source of peer announcements.
///
/// Static lists, local broadcast and manual configuration all fit this shape.
pub trait Discoverer: Send + Sync {
    /// Begins announcing; `local` is this node.
    fn start(&self, local: Peer);

    /// Stops announcing and ends every open `peers` stream.
    fn stop(&self);

    fn add_peer(&self, peer: Peer);

    /// Stream of announced peers. Peers known before the call are replayed first.
    fn peers(&self) -> mpsc::UnboundedReceiver<Peer>;
}
