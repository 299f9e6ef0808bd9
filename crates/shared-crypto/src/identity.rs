//! # Node Identity
//!
//! A node's Ed25519 key, its CA-issued certificate, and the CA certificate
//! that every peer is checked against.

use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use shared_types::NodeId;
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::signatures::{CertificateVerifier, SignatureEnvelope, ENVELOPE_VERSION};

/// Locations of a node's PEM files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub ca_certificate: PathBuf,
}

impl TlsPaths {
    /// `<dir>/node{id}.crt`, `<dir>/node{id}.key` and `<dir>/ca.crt`.
    pub fn in_dir(dir: impl AsRef<Path>, node: NodeId) -> Self {
        let dir = dir.as_ref();
        Self {
            certificate: dir.join(format!("{}.crt", node.common_name())),
            private_key: dir.join(format!("{}.key", node.common_name())),
            ca_certificate: dir.join("ca.crt"),
        }
    }
}

/// Key material of the local node.
#[derive(Clone)]
pub struct NodeIdentity {
    node_id: NodeId,
    signing_key: SigningKey,
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    verifier: CertificateVerifier,
}

impl NodeIdentity {
    /// Loads PEM files and checks the certificate against the CA.
    pub fn load(paths: &TlsPaths, node_id: NodeId) -> Result<Self, CryptoError> {
        let certificate = CertificateDer::from_pem_file(&paths.certificate)
            .map_err(|e| pem_error(&paths.certificate, e))?;
        let private_key = PrivatePkcs8KeyDer::from_pem_file(&paths.private_key)
            .map_err(|e| pem_error(&paths.private_key, e))?;
        let ca = CertificateDer::from_pem_file(&paths.ca_certificate)
            .map_err(|e| pem_error(&paths.ca_certificate, e))?;

        Self::from_der(
            node_id,
            certificate.to_vec(),
            private_key.secret_pkcs8_der().to_vec(),
            ca.to_vec(),
        )
    }

    /// Builds an identity from DER material.
    ///
    /// Fails if the certificate is not valid for `node_id` under `trust_root`
    /// or does not carry the public half of `private_key_pkcs8`.
    pub fn from_der(
        node_id: NodeId,
        certificate: Vec<u8>,
        private_key_pkcs8: Vec<u8>,
        trust_root: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        let private_key = Zeroizing::new(private_key_pkcs8);
        let signing_key = SigningKey::from_pkcs8_der(&private_key)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        let verifier = CertificateVerifier::new(trust_root);
        let certified = verifier.verify_certificate(&certificate, node_id)?;
        if certified != signing_key.verifying_key() {
            return Err(CryptoError::KeyMismatch);
        }

        Ok(Self {
            node_id,
            signing_key,
            certificate,
            private_key,
            verifier,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// PKCS#8 private key, for TLS configuration.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }

    pub fn trust_root_der(&self) -> &[u8] {
        self.verifier.trust_root()
    }

    pub fn verifier(&self) -> &CertificateVerifier {
        &self.verifier
    }

    /// Signs `msg` and wraps the result in a version 1 envelope.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature = self.signing_key.sign(msg);
        SignatureEnvelope {
            version: ENVELOPE_VERSION,
            signature: signature.to_bytes().to_vec(),
            certificate: self.certificate.clone(),
        }
        .to_bytes()
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("node_id", &self.node_id)
            .field("public_key", &hex::encode(&self.verifying_key().as_bytes()[..8]))
            .finish_non_exhaustive()
    }
}

fn pem_error(path: &Path, err: rustls_pki_types::pem::Error) -> CryptoError {
    CryptoError::Pem {
        path: path.display().to_string(),
        reason: format!("{err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestPki;

    #[test]
    fn test_load_from_pem_files() {
        let pki = TestPki::new();
        let dir = tempfile::tempdir().unwrap();
        pki.write_node_files(dir.path(), NodeId(3)).unwrap();

        let identity = NodeIdentity::load(&TlsPaths::in_dir(dir.path(), NodeId(3)), NodeId(3)).unwrap();
        assert_eq!(identity.node_id(), NodeId(3));
        assert_eq!(identity.trust_root_der(), pki.ca_der());
    }

    #[test]
    fn test_load_with_wrong_node_id_fails() {
        let pki = TestPki::new();
        let dir = tempfile::tempdir().unwrap();
        pki.write_node_files(dir.path(), NodeId(3)).unwrap();

        let err = NodeIdentity::load(&TlsPaths::in_dir(dir.path(), NodeId(3)), NodeId(4)).unwrap_err();
        assert!(matches!(err, CryptoError::Verification(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeIdentity::load(&TlsPaths::in_dir(dir.path(), NodeId(1)), NodeId(1)).unwrap_err();
        match err {
            CryptoError::Pem { path, .. } => assert!(path.ends_with("node1.crt")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_key_must_match_certificate() {
        let pki = TestPki::new();
        let a = pki.node_material(NodeId(1));
        let b = pki.node_material(NodeId(1));

        let err = NodeIdentity::from_der(
            NodeId(1),
            a.certificate_der,
            b.private_key_der,
            pki.ca_der().to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch));
    }
}
