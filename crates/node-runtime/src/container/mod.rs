//! # Node Container
//!
//! Owns every subsystem of one node and the tasks that drive them.
//!
//! ## Startup Sequence
//!
//! 1. Load the TLS identity
//! 2. Open the content store
//! 3. Start the ledger and its aggregation worker
//! 4. Bind the peer transport
//! 5. Build the consensus application over transport-backed ports
//! 6. Start the delivery monitor, discovery and the orderer or follower loop

pub mod config;

use std::future::Future;
use std::sync::Arc;

use fab_01_content_store::{open_store, ContentStore, StoreError};
use fab_02_ledger::Ledger;
use fab_03_consensus_app::{
    AppDependencies, AppError, AppResult, AppStatus, ConsensusApplication, FabricationApp,
};
use fab_04_peer_transport::{
    Discoverer, EnvelopePayload, MessageHandler, Peer, PeerTransport, StaticDiscoverer,
    TransportError,
};
use shared_crypto::{CryptoError, NodeIdentity};
use shared_types::{CodecError, ContentHash, NodeId, Request, RequestInfo};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::adapters::{TransportBlockSource, TransportPeerDirectory};
use crate::handlers::{run_follower, DeliveryMonitor, FollowerHandler, SoloOrderer};
pub use config::{ConfigError, NodeConfig, NodeMode};

/// Node startup and operation errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("identity: {0}")]
    Identity(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no live peer to forward the request to")]
    NoLivePeer,

    #[error("no node to fetch content {0} from")]
    NoContentSource(ContentHash),
}

pub type NodeResult<T> = Result<T, NodeError>;

/// A running node.
pub struct FabricationNode {
    config: NodeConfig,
    store: Arc<dyn ContentStore>,
    ledger: Arc<Ledger>,
    transport: Arc<PeerTransport>,
    app: Arc<FabricationApp>,
    orderer: Option<Arc<SoloOrderer>>,
    discoverer: Arc<StaticDiscoverer>,
    monitor: Arc<DeliveryMonitor>,
    shutdown: watch::Sender<bool>,
    fatal: watch::Receiver<Option<String>>,
}

impl FabricationNode {
    /// Loads the identity from `config.tls_dir` and starts the node.
    pub async fn start(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let identity = NodeIdentity::load(&config.tls_paths(), config.node_id)?;
        Self::start_with_identity(config, identity).await
    }

    pub async fn start_with_identity(
        config: NodeConfig,
        identity: NodeIdentity,
    ) -> NodeResult<Self> {
        config.validate()?;
        if identity.node_id() != config.node_id {
            return Err(ConfigError::Invalid(format!(
                "identity is node {}, config says {}",
                identity.node_id(),
                config.node_id
            ))
            .into());
        }
        let node_id = config.node_id;
        info!("===========================================");
        info!("  Fabrico node {} ({:?} mode)", node_id, config.mode);
        info!("===========================================");

        let store = open_store(&config.content_url)?;
        let ledger = Ledger::start(config.ledger.clone());
        let transport = PeerTransport::bind(
            &identity,
            config.transport.clone(),
            Arc::clone(&ledger),
            Arc::clone(&store),
        )?;

        let peers = config.parsed_peers()?;
        for peer in &peers {
            transport.add_peer(peer.clone());
        }

        let (app, records) = FabricationApp::new(AppDependencies {
            identity,
            ledger: Arc::clone(&ledger),
            peers: Arc::new(TransportPeerDirectory::new(Arc::clone(&transport))),
            blocks: Arc::new(TransportBlockSource::new(Arc::clone(&transport))),
            config: config.app_config(),
        });
        let app = Arc::new(app);

        let (shutdown, _) = watch::channel(false);
        let (fatal_tx, fatal) = watch::channel(None);

        let monitor = Arc::new(DeliveryMonitor::default());
        tokio::spawn(Arc::clone(&monitor).run(records, shutdown.subscribe()));

        let discoverer = Arc::new(StaticDiscoverer::new(peers));
        let local_port = transport
            .local_addr()
            .map_or(config.transport.listen_addr.port(), |addr| addr.port());
        discoverer.start(Peer::new(
            node_id,
            config.transport.listen_addr.ip().to_string(),
            local_port,
        ));
        transport.run_discovery(Arc::clone(&discoverer) as Arc<dyn Discoverer>);

        let orderer = match config.mode {
            NodeMode::Solo => {
                let orderer = Arc::new(SoloOrderer::new(Arc::clone(&app), config.max_batch));
                spawn_serve(Arc::clone(&transport), Arc::clone(&orderer) as Arc<dyn MessageHandler>);
                spawn_guarded(
                    fatal_tx,
                    Arc::clone(&orderer).run(config.tick, shutdown.subscribe()),
                );
                Some(orderer)
            }
            NodeMode::Follower => {
                spawn_serve(Arc::clone(&transport), Arc::new(FollowerHandler));
                spawn_guarded(
                    fatal_tx,
                    run_follower(Arc::clone(&app), config.tick, shutdown.subscribe()),
                );
                None
            }
        };

        info!(
            "[fab-node] ✅ Node {} ready on {:?}",
            node_id,
            transport.local_addr()
        );
        Ok(Self {
            config,
            store,
            ledger,
            transport,
            app,
            orderer,
            discoverer,
            monitor,
            shutdown,
            fatal,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn app(&self) -> &Arc<FabricationApp> {
        &self.app
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<PeerTransport> {
        &self.transport
    }

    pub fn orderer(&self) -> Option<&Arc<SoloOrderer>> {
        self.orderer.as_ref()
    }

    pub fn monitor(&self) -> &Arc<DeliveryMonitor> {
        &self.monitor
    }

    /// This node as other nodes should dial it.
    pub fn advertised_peer(&self, host: &str) -> Option<Peer> {
        let port = self.transport.local_addr()?.port();
        Some(Peer::new(self.node_id(), host, port))
    }

    pub async fn status(&self) -> AppStatus {
        self.app.status().await
    }

    /// Orders `request` locally in solo mode, otherwise forwards it to a live peer.
    pub async fn submit(&self, request: &Request) -> NodeResult<RequestInfo> {
        let raw = request.to_bytes()?;
        if let Some(orderer) = &self.orderer {
            return Ok(orderer.submit(raw)?);
        }

        let info = self.app.verify_request(&raw)?;
        let peer = self.transport.live_peer().ok_or(NodeError::NoLivePeer)?;
        self.transport
            .try_send(peer, EnvelopePayload::ForwardedRequest(raw))
            .await?;
        info!("[fab-node] Forwarded {} to node {}", info, peer);
        Ok(info)
    }

    /// Stores `content` locally and submits an `AddFile` naming this node as origin.
    pub async fn add_file(&self, content: &[u8]) -> NodeResult<(ContentHash, RequestInfo)> {
        let hash = self.store.store(content)?;
        let request = Request::add_file(
            self.node_id().common_name(),
            uuid::Uuid::new_v4().to_string(),
            hash,
            self.node_id(),
        );
        let info = self.submit(&request).await?;
        Ok((hash, info))
    }

    /// Submits one `AllowFabrication` per node for `parts` parts of `hash`.
    pub async fn allow_fabrication(
        &self,
        hash: ContentHash,
        nodes: &[NodeId],
        parts: u64,
    ) -> NodeResult<Vec<RequestInfo>> {
        let mut submitted = Vec::with_capacity(nodes.len());
        for node in nodes {
            let request = Request::allow_fabrication(
                self.node_id().common_name(),
                uuid::Uuid::new_v4().to_string(),
                hash,
                *node,
                parts,
            );
            submitted.push(self.submit(&request).await?);
        }
        Ok(submitted)
    }

    /// Local content, or a verified download from its origin (else any live peer).
    pub async fn fetch_content(&self, hash: ContentHash) -> NodeResult<Vec<u8>> {
        match self.store.get(&hash) {
            Ok(content) => return Ok(content),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let source = self
            .ledger
            .file_origin(&hash)
            .filter(|origin| *origin != self.node_id() && self.transport.is_connected(*origin))
            .or_else(|| self.transport.live_peer())
            .ok_or(NodeError::NoContentSource(hash))?;
        let content = self.transport.download(source, hash).await?;
        self.store.store(&content)?;
        info!(
            "[fab-node] Fetched {} ({} bytes) from node {}",
            hash,
            content.len(),
            source
        );
        Ok(content)
    }

    /// Resolves with the diagnostic once the orderer or follower halts on a
    /// fatal error; `None` if it stopped because of shutdown.
    pub async fn fatal(&self) -> Option<String> {
        let mut fatal = self.fatal.clone();
        let diagnostic = match fatal.wait_for(Option::is_some).await {
            Ok(diagnostic) => diagnostic.clone(),
            Err(_) => None,
        };
        diagnostic
    }

    pub fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        self.discoverer.stop();
        self.transport.shutdown();
        info!("[fab-node] Node {} stopped", self.node_id());
    }
}

fn spawn_serve(transport: Arc<PeerTransport>, handler: Arc<dyn MessageHandler>) {
    tokio::spawn(async move {
        if let Err(e) = transport.serve(handler.as_ref()).await {
            warn!("[fab-node] Inbound dispatch not started: {}", e);
        }
    });
}

/// Runs `task`, publishing its fatal error for [`FabricationNode::fatal`].
fn spawn_guarded<F>(fatal: watch::Sender<Option<String>>, task: F)
where
    F: Future<Output = AppResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("[fab-node] 🛑 Fatal: {}", e);
            fatal.send_replace(Some(e.to_string()));
        }
    });
}
