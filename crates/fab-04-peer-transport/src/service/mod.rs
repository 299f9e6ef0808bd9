//! Peer transport service.
//!
//! # Tasks
//! - Accept loop: one task, spawns a task per inbound connection and one per
//!   inbound stream
//! - Supervisors: one per connected peer, redial after failure or loss
//! - `serve`: the caller's dispatch loop over the inbound queue
//!
//! All of them stop when [`PeerTransport::shutdown`] flips the watch channel.

pub mod client;
mod server;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use fab_01_content_store::ContentStore;
use fab_02_ledger::Ledger;
use parking_lot::{Mutex, RwLock};
use shared_crypto::NodeIdentity;
use shared_types::NodeId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::framing::{read_frame, write_frame};
use crate::adapters::tls;
use crate::config::TransportConfig;
use crate::domain::errors::{TransportError, TransportResult};
use crate::domain::messages::{EnvelopePayload, PeerEnvelope, RpcRequest, RpcResponse};
use crate::domain::peer::Peer;
use crate::ports::inbound::MessageHandler;
use crate::ports::outbound::Discoverer;

/// Resolves once the shutdown flag is set.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// QUIC endpoint plus connection bookkeeping for one node.
pub struct PeerTransport {
    node_id: NodeId,
    config: TransportConfig,
    endpoint: quinn::Endpoint,
    ledger: Arc<Ledger>,
    store: Arc<dyn ContentStore>,
    peers: RwLock<BTreeMap<NodeId, Peer>>,
    connections: RwLock<HashMap<NodeId, quinn::Connection>>,
    supervised: Mutex<HashSet<NodeId>>,
    inbound_tx: mpsc::Sender<PeerEnvelope>,
    inbound_rx: Mutex<Option<mpsc::Receiver<PeerEnvelope>>>,
    shutdown: watch::Sender<bool>,
}

impl PeerTransport {
    /// Binds the endpoint and starts accepting. Must run inside a tokio runtime.
    pub fn bind(
        identity: &NodeIdentity,
        config: TransportConfig,
        ledger: Arc<Ledger>,
        store: Arc<dyn ContentStore>,
    ) -> TransportResult<Arc<Self>> {
        let server = tls::server_config(identity, &config)?;
        let client = tls::client_config(identity, &config)?;

        let mut endpoint =
            quinn::Endpoint::server(server, config.listen_addr).map_err(|e| {
                TransportError::Bind {
                    addr: config.listen_addr,
                    reason: e.to_string(),
                }
            })?;
        endpoint.set_default_client_config(client);

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_buffer.max(1));
        let (shutdown, _) = watch::channel(false);

        let transport = Arc::new(Self {
            node_id: identity.node_id(),
            config,
            endpoint,
            ledger,
            store,
            peers: RwLock::new(BTreeMap::new()),
            connections: RwLock::new(HashMap::new()),
            supervised: Mutex::new(HashSet::new()),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            shutdown,
        });

        info!(
            "[fab-04] 🌐 Node {} listening on {:?}",
            transport.node_id,
            transport.local_addr()
        );
        tokio::spawn(Arc::clone(&transport).accept_loop());
        Ok(transport)
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.local_addr().ok()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Registers or updates the address of `peer`.
    pub fn add_peer(&self, peer: Peer) {
        debug!("[fab-04] Known peer {}", peer);
        self.peers.write().insert(peer.id, peer);
    }

    pub fn peer(&self, id: NodeId) -> Option<Peer> {
        self.peers.read().get(&id).cloned()
    }

    /// Every known node id, this node included, ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: BTreeSet<NodeId> = self.peers.read().keys().copied().collect();
        nodes.insert(self.node_id);
        nodes.into_iter().collect()
    }

    pub fn is_connected(&self, peer: NodeId) -> bool {
        self.connections
            .read()
            .get(&peer)
            .is_some_and(|c| c.close_reason().is_none())
    }

    /// Lowest-numbered connected peer other than this node.
    pub fn live_peer(&self) -> Option<NodeId> {
        self.connections
            .read()
            .iter()
            .filter(|(id, c)| **id != self.node_id && c.close_reason().is_none())
            .map(|(id, _)| *id)
            .min()
    }

    /// Dials `peer` once and leaves a supervisor redialing in the background.
    ///
    /// Returns whether the first attempt connected. A failure is logged, never
    /// returned; messages sent before the supervisor reconnects are dropped.
    pub async fn connect(self: &Arc<Self>, peer: NodeId) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        let connected = match self.dial(peer).await {
            Ok(()) => {
                info!("[fab-04] Connected to node {}", peer);
                true
            }
            Err(TransportError::UnknownPeer(_)) => {
                warn!("[fab-04] ⚠️ No address for node {}; not dialing", peer);
                return false;
            }
            Err(e) => {
                warn!(
                    "[fab-04] ⚠️ Dial to node {} failed: {}; retrying every {:?}",
                    peer, e, self.config.reconnect_interval
                );
                false
            }
        };
        if self.supervised.lock().insert(peer) {
            tokio::spawn(Arc::clone(self).supervise(peer));
        }
        connected
    }

    async fn dial(&self, peer: NodeId) -> TransportResult<()> {
        let target = self.peer(peer).ok_or(TransportError::UnknownPeer(peer))?;
        let addr = target.resolve().await?;
        let connecting = self
            .endpoint
            .connect(addr, &peer.common_name())
            .map_err(|e| TransportError::Connect {
                peer,
                reason: e.to_string(),
            })?;
        let connection = tokio::time::timeout(self.config.connect_timeout, connecting)
            .await
            .map_err(|_| TransportError::ConnectTimeout(peer))?
            .map_err(|e| TransportError::Connect {
                peer,
                reason: e.to_string(),
            })?;

        if let Some(previous) = self.connections.write().insert(peer, connection) {
            previous.close(0u32.into(), b"replaced");
        }
        Ok(())
    }

    async fn supervise(self: Arc<Self>, peer: NodeId) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            let current = self.connections.read().get(&peer).cloned();
            match current {
                Some(connection) => {
                    tokio::select! {
                        _ = stopped(&mut shutdown) => break,
                        reason = connection.closed() => {
                            warn!("[fab-04] Connection to node {} lost: {}", peer, reason);
                            let mut connections = self.connections.write();
                            if connections.get(&peer).is_some_and(|c| c.stable_id() == connection.stable_id()) {
                                connections.remove(&peer);
                            }
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = stopped(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.config.reconnect_interval) => {}
                    }
                    match self.dial(peer).await {
                        Ok(()) => info!("[fab-04] Reconnected to node {}", peer),
                        Err(TransportError::UnknownPeer(_)) => {
                            warn!("[fab-04] Node {} has no address any more; giving up", peer);
                            break;
                        }
                        Err(e) => debug!("[fab-04] Redial of node {} failed: {}", peer, e),
                    }
                }
            }
        }
        self.supervised.lock().remove(&peer);
        debug!("[fab-04] Supervisor for node {} stopped", peer);
    }

    fn connection(&self, peer: NodeId) -> TransportResult<quinn::Connection> {
        self.connections
            .read()
            .get(&peer)
            .filter(|c| c.close_reason().is_none())
            .cloned()
            .ok_or(TransportError::NotConnected(peer))
    }

    /// Opens a stream to `peer` and sends `request` on it.
    async fn open_rpc(
        &self,
        peer: NodeId,
        request: &RpcRequest,
    ) -> TransportResult<quinn::RecvStream> {
        let connection = self.connection(peer)?;
        let (mut send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        write_frame(&mut send, request).await?;
        send.finish()
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        Ok(recv)
    }

    /// Sends one envelope and waits for the acknowledgement.
    pub(crate) async fn send_envelope(
        &self,
        target: NodeId,
        envelope: PeerEnvelope,
    ) -> TransportResult<()> {
        let exchange = async {
            let mut recv = self
                .open_rpc(target, &RpcRequest::Consensus(envelope))
                .await?;
            match read_frame::<_, RpcResponse>(&mut recv, "rpc response").await? {
                Some(RpcResponse::Ack) => Ok(()),
                Some(RpcResponse::Failure { kind, message }) => {
                    Err(TransportError::Remote { kind, message })
                }
                Some(other) => Err(TransportError::UnexpectedResponse(other.name())),
                None => Err(TransportError::NoResponse),
            }
        };
        tokio::time::timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| TransportError::RequestTimeout(target))?
    }

    /// Sends `payload` to `target`, reporting failure to the caller.
    pub async fn try_send(&self, target: NodeId, payload: EnvelopePayload) -> TransportResult<()> {
        let envelope = PeerEnvelope {
            sender: self.node_id,
            payload,
        };
        self.send_envelope(target, envelope).await
    }

    /// Sends an opaque consensus message; failures are logged and dropped.
    pub async fn send_consensus(&self, target: NodeId, message: Vec<u8>) {
        if let Err(e) = self
            .try_send(target, EnvelopePayload::Consensus(message))
            .await
        {
            warn!(
                "[fab-04] Dropped consensus message to node {}: {}",
                target, e
            );
        }
    }

    /// Forwards a client request; failures are logged and dropped.
    pub async fn send_request(&self, target: NodeId, request: Vec<u8>) {
        if let Err(e) = self
            .try_send(target, EnvelopePayload::ForwardedRequest(request))
            .await
        {
            warn!(
                "[fab-04] Dropped forwarded request to node {}: {}",
                target, e
            );
        }
    }

    /// Drains the inbound queue into `handler` until shutdown.
    ///
    /// The envelope being handled when shutdown arrives completes; nothing
    /// after it is handled. Only one caller may serve.
    pub async fn serve(&self, handler: &dyn MessageHandler) -> TransportResult<()> {
        let mut inbound = self
            .inbound_rx
            .lock()
            .take()
            .ok_or(TransportError::AlreadyServing)?;
        let mut shutdown = self.shutdown.subscribe();
        info!("[fab-04] Serving inbound messages");

        loop {
            let envelope = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                envelope = inbound.recv() => envelope,
            };
            let Some(PeerEnvelope { sender, payload }) = envelope else {
                break;
            };
            match payload {
                EnvelopePayload::Consensus(message) => handler.handle_message(sender, message),
                EnvelopePayload::ForwardedRequest(request) => {
                    handler.handle_request(sender, request)
                }
            }
        }

        info!("[fab-04] Inbound dispatch stopped");
        Ok(())
    }

    /// Connects to every peer `discoverer` announces, skipping this node.
    pub fn run_discovery(self: &Arc<Self>, discoverer: Arc<dyn Discoverer>) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut announced = discoverer.peers();
            let mut shutdown = transport.shutdown.subscribe();
            loop {
                let peer = tokio::select! {
                    _ = stopped(&mut shutdown) => break,
                    peer = announced.recv() => peer,
                };
                let Some(peer) = peer else { break };
                if peer.id == transport.node_id {
                    continue;
                }
                transport.add_peer(peer.clone());
                transport.connect(peer.id).await;
            }
            debug!("[fab-04] Discovery loop ended");
        })
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops serving, accepting and redialing, then closes every connection.
    pub fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        self.connections.write().clear();
        self.endpoint.close(0u32.into(), b"shutdown");
        info!("[fab-04] Node {} transport shut down", self.node_id);
    }
}
