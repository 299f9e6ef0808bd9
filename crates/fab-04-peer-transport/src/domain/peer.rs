//! Peer addresses.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::NodeId;

use super::errors::{TransportError, TransportResult};

/// A reachable node, written `id@host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// First address the host name resolves to.
    pub async fn resolve(&self) -> TransportResult<SocketAddr> {
        let address = self.address();
        let mut addrs =
            tokio::net::lookup_host(address.clone())
                .await
                .map_err(|e| TransportError::Resolve {
                    address: address.clone(),
                    reason: e.to_string(),
                })?;
        addrs.next().ok_or(TransportError::Resolve {
            address,
            reason: "no addresses".into(),
        })
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address())
    }
}

impl FromStr for Peer {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidPeer(s.to_string());
        let (id, address) = s.trim().split_once('@').ok_or_else(invalid)?;
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            id: NodeId(id.parse().map_err(|_| invalid())?),
            host: host.to_string(),
            port: port.parse().map_err(|_| invalid())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer() {
        let peer: Peer = "3@fab-3.local:7050".parse().unwrap();
        assert_eq!(peer, Peer::new(NodeId(3), "fab-3.local", 7050));
        assert_eq!(peer.to_string(), "3@fab-3.local:7050");
    }

    #[test]
    fn test_parse_ipv6_peer() {
        let peer: Peer = "2@[::1]:7051".parse().unwrap();
        assert_eq!(peer.host, "::1");
        assert_eq!(peer.port, 7051);
        assert_eq!(peer.to_string(), "2@[::1]:7051");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "3", "3@host", "x@host:1", "3@:7050", "3@host:port", "3@host:70000"] {
            assert!(bad.parse::<Peer>().is_err(), "{bad:?} parsed");
        }
    }

    #[tokio::test]
    async fn test_resolve_loopback() {
        let addr = Peer::new(NodeId(1), "127.0.0.1", 7050).resolve().await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 7050)));
    }
}
