//! Throwaway PKI for tests: an Ed25519 CA and node certificates following
//! the `node{id}` naming convention.

use std::io;
use std::path::Path;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, PKCS_ECDSA_P256_SHA256, PKCS_ED25519,
};
use shared_types::NodeId;

use crate::identity::{NodeIdentity, TlsPaths};

/// DER and PEM forms of one node's certificate and key.
pub struct NodeMaterial {
    pub certificate_der: Vec<u8>,
    pub private_key_der: Vec<u8>,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// A CA able to issue node certificates.
pub struct TestPki {
    ca_cert: Certificate,
    ca_key: KeyPair,
}

impl Default for TestPki {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = KeyPair::generate_for(&PKCS_ED25519).expect("generate CA key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        params
            .distinguished_name
            .push(DnType::CommonName, "Fabrico Test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = params.self_signed(&ca_key).expect("self-sign CA");
        Self { ca_cert, ca_key }
    }

    pub fn ca_der(&self) -> &[u8] {
        self.ca_cert.der()
    }

    pub fn ca_pem(&self) -> String {
        self.ca_cert.pem()
    }

    /// Issues a fresh Ed25519 certificate for `node`.
    pub fn node_material(&self, node: NodeId) -> NodeMaterial {
        let key = KeyPair::generate_for(&PKCS_ED25519).expect("generate node key");
        let cert = self.issue(node, &key);
        NodeMaterial {
            certificate_der: cert.der().to_vec(),
            private_key_der: key.serialize_der(),
            certificate_pem: cert.pem(),
            private_key_pem: key.serialize_pem(),
        }
    }

    /// Fresh identity for `node`.
    pub fn identity(&self, node: NodeId) -> NodeIdentity {
        let material = self.node_material(node);
        NodeIdentity::from_der(
            node,
            material.certificate_der,
            material.private_key_der,
            self.ca_der().to_vec(),
        )
        .expect("issued identity is valid")
    }

    /// A CA-issued certificate for `node` carrying a P-256 key instead of Ed25519.
    pub fn ecdsa_certificate(&self, node: NodeId) -> Vec<u8> {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("generate P-256 key");
        self.issue(node, &key).der().to_vec()
    }

    /// Writes `node{id}.crt`, `node{id}.key` and `ca.crt` into `dir`.
    pub fn write_node_files(&self, dir: &Path, node: NodeId) -> io::Result<TlsPaths> {
        let material = self.node_material(node);
        let paths = TlsPaths::in_dir(dir, node);
        std::fs::write(&paths.certificate, material.certificate_pem)?;
        std::fs::write(&paths.private_key, material.private_key_pem)?;
        std::fs::write(&paths.ca_certificate, self.ca_pem())?;
        Ok(paths)
    }

    fn issue(&self, node: NodeId, key: &KeyPair) -> Certificate {
        let mut params = CertificateParams::new(vec![node.common_name(), "localhost".to_string()])
            .expect("node params");
        params
            .distinguished_name
            .push(DnType::CommonName, node.common_name());
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params
            .signed_by(key, &self.ca_cert, &self.ca_key)
            .expect("sign node certificate")
    }
}
