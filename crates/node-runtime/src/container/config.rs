//! # Node Configuration
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config <path>` or `FAB_CONFIG`)
//! 3. `FAB_*` environment variables
//!
//! ```toml
//! node_id = 2
//! tls_dir = "/etc/fab/tls"
//! content_url = "file:///var/lib/fab/content"
//! peers = ["1@10.0.0.1:7050", "3@10.0.0.3:7050"]
//! mode = "follower"
//!
//! [transport]
//! listen_addr = "0.0.0.0:7050"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fab_02_ledger::LedgerConfig;
use fab_03_consensus_app::AppConfig;
use fab_04_peer_transport::{Peer, TransportConfig};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use shared_crypto::TlsPaths;
use shared_types::NodeId;
use thiserror::Error;

pub const CONFIG_ENV: &str = "FAB_CONFIG";
pub const NODE_ID_ENV: &str = "FAB_NODE_ID";
pub const LISTEN_PORT_ENV: &str = "FAB_LISTEN_PORT";
pub const TLS_DIR_ENV: &str = "FAB_TLS_DIR";
pub const CONTENT_URL_ENV: &str = "FAB_CONTENT_URL";
/// Comma-separated `id@host:port` list.
pub const PEERS_ENV: &str = "FAB_PEERS";
pub const MODE_ENV: &str = "FAB_MODE";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(String),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the node orders requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Runs the solo orderer: this node assembles and delivers every batch.
    #[default]
    Solo,
    /// Replicates from a live peer on every tick and forwards submissions.
    Follower,
}

impl std::str::FromStr for NodeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solo" => Ok(NodeMode::Solo),
            "follower" => Ok(NodeMode::Follower),
            _ => Err(()),
        }
    }
}

/// Complete node configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: NodeId,
    /// Holds `node{id}.crt`, `node{id}.key` and `ca.crt`.
    pub tls_dir: PathBuf,
    /// `mem://` or `file:///path`.
    pub content_url: String,
    /// Static peers, `id@host:port`.
    pub peers: Vec<String>,
    pub delivery_queue: usize,
    pub mode: NodeMode,
    /// Ordering tick in solo mode, sync tick in follower mode.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_ms")]
    pub tick: Duration,
    /// Most requests the solo orderer puts in one batch.
    pub max_batch: usize,
    pub ledger: LedgerConfig,
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId(1),
            tls_dir: PathBuf::from("tls"),
            content_url: "mem://".to_string(),
            peers: Vec::new(),
            delivery_queue: 100,
            mode: NodeMode::Solo,
            tick: Duration::from_millis(100),
            max_batch: 100,
            ledger: LedgerConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loopback node with test-sized queues and timers.
    pub fn for_testing(node_id: NodeId, tls_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_id,
            tls_dir: tls_dir.into(),
            tick: Duration::from_millis(20),
            max_batch: 16,
            delivery_queue: 16,
            ledger: LedgerConfig::for_testing(),
            transport: TransportConfig::for_testing(),
            ..Self::default()
        }
    }

    /// Defaults, then the file from `path` or `FAB_CONFIG`, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `FAB_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(NODE_ID_ENV) {
            let id = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: NODE_ID_ENV,
                value: value.clone(),
            })?;
            self.node_id = NodeId(id);
        }
        if let Some(value) = lookup(LISTEN_PORT_ENV) {
            let port: u16 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: LISTEN_PORT_ENV,
                value: value.clone(),
            })?;
            self.transport.listen_addr =
                SocketAddr::new(self.transport.listen_addr.ip(), port);
        }
        if let Some(value) = lookup(TLS_DIR_ENV) {
            self.tls_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(CONTENT_URL_ENV) {
            self.content_url = value;
        }
        if let Some(value) = lookup(PEERS_ENV) {
            self.peers = value
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup(MODE_ENV) {
            self.mode = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: MODE_ENV,
                value: value.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_queue == 0 {
            return Err(ConfigError::Invalid("delivery_queue must be positive".into()));
        }
        if self.max_batch == 0 {
            return Err(ConfigError::Invalid("max_batch must be positive".into()));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::Invalid("tick_ms must be positive".into()));
        }
        if !(self.content_url.starts_with("mem://") || self.content_url.starts_with("file://")) {
            return Err(ConfigError::Invalid(format!(
                "content_url {:?} must start with mem:// or file://",
                self.content_url
            )));
        }

        let peers = self.parsed_peers()?;
        let mut seen = std::collections::BTreeSet::new();
        for peer in &peers {
            if peer.id == self.node_id {
                return Err(ConfigError::Invalid(format!(
                    "peer list contains this node ({})",
                    peer
                )));
            }
            if !seen.insert(peer.id) {
                return Err(ConfigError::Invalid(format!("node {} listed twice", peer.id)));
            }
        }
        if self.mode == NodeMode::Follower && peers.is_empty() {
            return Err(ConfigError::Invalid("follower mode needs at least one peer".into()));
        }
        Ok(())
    }

    pub fn parsed_peers(&self) -> Result<Vec<Peer>, ConfigError> {
        self.peers
            .iter()
            .map(|peer| {
                peer.parse::<Peer>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    pub fn tls_paths(&self) -> TlsPaths {
        TlsPaths::in_dir(&self.tls_dir, self.node_id)
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            delivery_queue: self.delivery_queue,
            ..AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.delivery_queue, 100);
        assert_eq!(config.mode, NodeMode::Solo);
        assert_eq!(config.transport.inbound_buffer, 1000);
    }

    #[test]
    fn test_toml_file() {
        let config = NodeConfig::from_toml(
            r#"
            node_id = 2
            tls_dir = "/etc/fab/tls"
            content_url = "file:///var/lib/fab"
            peers = ["1@10.0.0.1:7050", "3@10.0.0.3:7050"]
            mode = "follower"
            tick_ms = 250

            [transport]
            listen_addr = "0.0.0.0:7052"

            [ledger]
            fault_history = 8
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.node_id, NodeId(2));
        assert_eq!(config.mode, NodeMode::Follower);
        assert_eq!(config.tick, Duration::from_millis(250));
        assert_eq!(config.transport.listen_addr.port(), 7052);
        assert_eq!(config.ledger.fault_history, 8);
        assert_eq!(config.ledger.aggregation_queue, 1024);
        assert_eq!(
            config.parsed_peers().unwrap(),
            vec![
                Peer::new(NodeId(1), "10.0.0.1", 7050),
                Peer::new(NodeId(3), "10.0.0.3", 7050)
            ]
        );
        assert_eq!(
            config.tls_paths().certificate,
            PathBuf::from("/etc/fab/tls/node2.crt")
        );
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(matches!(
            NodeConfig::from_toml(r#"mode = "leader""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = NodeConfig::default();
        config
            .apply_overrides(lookup(&[
                (NODE_ID_ENV, "4"),
                (LISTEN_PORT_ENV, "7999"),
                (TLS_DIR_ENV, "/tmp/tls"),
                (CONTENT_URL_ENV, "file:///tmp/blobs"),
                (PEERS_ENV, "1@a:7050, 2@b:7050,"),
                (MODE_ENV, "Follower"),
            ]))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.node_id, NodeId(4));
        assert_eq!(config.transport.listen_addr.port(), 7999);
        assert_eq!(config.tls_dir, PathBuf::from("/tmp/tls"));
        assert_eq!(config.content_url, "file:///tmp/blobs");
        assert_eq!(config.peers, vec!["1@a:7050", "2@b:7050"]);
        assert_eq!(config.mode, NodeMode::Follower);
    }

    #[test]
    fn test_bad_env_value_named() {
        let mut config = NodeConfig::default();
        let err = config
            .apply_overrides(lookup(&[(LISTEN_PORT_ENV, "port")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: LISTEN_PORT_ENV,
                ..
            }
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut own = NodeConfig::default();
        own.peers = vec!["1@localhost:7050".into()];
        assert!(own.validate().is_err());

        let mut duplicate = NodeConfig::default();
        duplicate.peers = vec!["2@a:1".into(), "2@b:2".into()];
        assert!(duplicate.validate().is_err());

        let mut garbage = NodeConfig::default();
        garbage.peers = vec!["nonsense".into()];
        assert!(garbage.validate().is_err());

        let mut lonely = NodeConfig::default();
        lonely.mode = NodeMode::Follower;
        assert!(lonely.validate().is_err());

        let mut store = NodeConfig::default();
        store.content_url = "s3://bucket".into();
        assert!(store.validate().is_err());

        let mut queue = NodeConfig::default();
        queue.delivery_queue = 0;
        assert!(queue.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = NodeConfig::from_file(Path::new("/nonexistent/fab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
