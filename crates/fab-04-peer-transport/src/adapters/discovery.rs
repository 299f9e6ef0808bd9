//! Discovery from a configured peer list.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::peer::Peer;
use crate::ports::outbound::Discoverer;

#[derive(Default)]
struct State {
    local: Option<Peer>,
    known: Vec<Peer>,
    subscribers: Vec<mpsc::UnboundedSender<Peer>>,
    stopped: bool,
}

/// Announces a fixed set of peers plus any added at runtime.
#[derive(Default)]
pub struct StaticDiscoverer {
    state: Mutex<State>,
}

impl StaticDiscoverer {
    pub fn new(peers: impl IntoIterator<Item = Peer>) -> Self {
        let discoverer = Self::default();
        for peer in peers {
            discoverer.add_peer(peer);
        }
        discoverer
    }

    pub fn known(&self) -> Vec<Peer> {
        self.state.lock().known.clone()
    }
}

impl Discoverer for StaticDiscoverer {
    fn start(&self, local: Peer) {
        let mut state = self.state.lock();
        info!(
            "[fab-04] Discovery started for {} with {} known peers",
            local,
            state.known.len()
        );
        state.local = Some(local);
        state.stopped = false;
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.subscribers.clear();
        debug!("[fab-04] Discovery stopped");
    }

    fn add_peer(&self, peer: Peer) {
        let mut state = self.state.lock();
        match state.known.iter_mut().find(|p| p.id == peer.id) {
            Some(existing) if *existing == peer => return,
            Some(existing) => *existing = peer.clone(),
            None => state.known.push(peer.clone()),
        }
        state
            .subscribers
            .retain(|subscriber| subscriber.send(peer.clone()).is_ok());
    }

    fn peers(&self) -> mpsc::UnboundedReceiver<Peer> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.stopped {
            return rx;
        }
        for peer in &state.known {
            let _ = tx.send(peer.clone());
        }
        state.subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::NodeId;

    fn peer(id: u64, port: u16) -> Peer {
        Peer::new(NodeId(id), "127.0.0.1", port)
    }

    #[tokio::test]
    async fn test_replays_known_then_streams_new() {
        let discoverer = StaticDiscoverer::new([peer(1, 7001), peer(2, 7002)]);
        discoverer.start(peer(9, 7009));
        let mut stream = discoverer.peers();

        assert_eq!(stream.recv().await, Some(peer(1, 7001)));
        assert_eq!(stream.recv().await, Some(peer(2, 7002)));

        discoverer.add_peer(peer(3, 7003));
        assert_eq!(stream.recv().await, Some(peer(3, 7003)));
    }

    #[tokio::test]
    async fn test_duplicate_peer_not_reannounced() {
        let discoverer = StaticDiscoverer::new([peer(1, 7001)]);
        let mut stream = discoverer.peers();
        assert!(stream.recv().await.is_some());

        discoverer.add_peer(peer(1, 7001));
        assert!(stream.try_recv().is_err());

        // A moved peer is announced again with its new address.
        discoverer.add_peer(peer(1, 7101));
        assert_eq!(stream.recv().await, Some(peer(1, 7101)));
        assert_eq!(discoverer.known(), vec![peer(1, 7101)]);
    }

    #[tokio::test]
    async fn test_stop_ends_streams() {
        let discoverer = StaticDiscoverer::new([peer(1, 7001)]);
        let mut stream = discoverer.peers();
        assert!(stream.recv().await.is_some());

        discoverer.stop();
        assert_eq!(stream.recv().await, None);
        assert_eq!(discoverer.peers().recv().await, None);
    }
}
