//! Mutual TLS 1.3 configuration for the QUIC endpoint.
//!
//! Both sides present the node certificate and verify the other against the
//! shared CA. Clients dial with server name `node{id}`.

use std::sync::Arc;

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use shared_crypto::NodeIdentity;

use crate::config::TransportConfig;
use crate::domain::errors::{TransportError, TransportResult};

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn tls_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Tls(e.to_string())
}

fn roots(identity: &NodeIdentity) -> TransportResult<Arc<RootCertStore>> {
    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(identity.trust_root_der().to_vec()))
        .map_err(tls_error)?;
    Ok(Arc::new(roots))
}

fn credentials(
    identity: &NodeIdentity,
) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let chain = vec![CertificateDer::from(identity.certificate_der().to_vec())];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        identity.private_key_der().to_vec(),
    ));
    (chain, key)
}

fn transport(config: &TransportConfig) -> TransportResult<Arc<quinn::TransportConfig>> {
    let idle = quinn::IdleTimeout::try_from(config.idle_timeout)
        .map_err(|e| TransportError::Config(format!("idle timeout: {e}")))?;
    let mut transport = quinn::TransportConfig::default();
    transport
        .max_idle_timeout(Some(idle))
        .keep_alive_interval(config.keep_alive_interval);
    Ok(Arc::new(transport))
}

/// Server side: requires a client certificate chained to the CA.
pub fn server_config(
    identity: &NodeIdentity,
    config: &TransportConfig,
) -> TransportResult<quinn::ServerConfig> {
    let verifier = WebPkiClientVerifier::builder_with_provider(roots(identity)?, provider())
        .build()
        .map_err(tls_error)?;
    let (chain, key) = credentials(identity);

    let mut crypto = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(tls_error)?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(tls_error)?;
    crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic = QuicServerConfig::try_from(crypto).map_err(tls_error)?;
    let mut server = quinn::ServerConfig::with_crypto(Arc::new(quic));
    server.transport_config(transport(config)?);
    Ok(server)
}

/// Client side: verifies the server against the CA and presents our certificate.
pub fn client_config(
    identity: &NodeIdentity,
    config: &TransportConfig,
) -> TransportResult<quinn::ClientConfig> {
    let (chain, key) = credentials(identity);

    let mut crypto = rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(tls_error)?
        .with_root_certificates(roots(identity)?)
        .with_client_auth_cert(chain, key)
        .map_err(tls_error)?;
    crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic = QuicClientConfig::try_from(crypto).map_err(tls_error)?;
    let mut client = quinn::ClientConfig::new(Arc::new(quic));
    client.transport_config(transport(config)?);
    Ok(client)
}

/// Application protocol negotiated on every connection.
pub const ALPN: &[u8] = b"fab/1";

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::test_utils::TestPki;
    use shared_types::NodeId;

    #[test]
    fn test_configs_build_for_ed25519_identity() {
        let pki = TestPki::new();
        let identity = pki.identity(NodeId(1));
        let config = TransportConfig::for_testing();
        assert!(server_config(&identity, &config).is_ok());
        assert!(client_config(&identity, &config).is_ok());
    }
}
