//! # Certificate-Backed Signatures
//!
//! A signature travels as a [`SignatureEnvelope`]: the raw Ed25519 signature
//! plus the signer's DER certificate. Verification never trusts the envelope's
//! certificate by itself; it is checked against the configured trust root and
//! against the identity the caller expects.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use shared_types::{decode, encode, NodeId};
use tracing::debug;
use x509_parser::oid_registry::OID_SIG_ED25519;
use x509_parser::prelude::*;

use crate::errors::{CryptoError, VerificationError};

/// Current envelope version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Versioned signature with the signer's certificate attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub version: u32,
    /// 64-byte Ed25519 signature.
    pub signature: Vec<u8>,
    /// Signer's X.509 certificate, DER.
    pub certificate: Vec<u8>,
}

impl SignatureEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        encode(self).map_err(|e| CryptoError::Malformed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationError> {
        decode("signature envelope", bytes)
            .map_err(|e| VerificationError::MalformedEnvelope(e.to_string()))
    }
}

/// The message a consenter signs for a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    /// Proposal digest.
    pub payload: Vec<u8>,
    /// Prepare-phase evidence supplied by the engine.
    pub auxiliary_data: Vec<u8>,
}

impl SignedProposal {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        encode(self).map_err(|e| CryptoError::Malformed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationError> {
        decode("signed proposal", bytes)
            .map_err(|e| VerificationError::MalformedEnvelope(e.to_string()))
    }
}

/// Verifies envelopes against a fixed trust root.
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    trust_root: Vec<u8>,
}

impl CertificateVerifier {
    /// `trust_root` is the CA certificate in DER form.
    pub fn new(trust_root: Vec<u8>) -> Self {
        Self { trust_root }
    }

    pub fn trust_root(&self) -> &[u8] {
        &self.trust_root
    }

    /// Verifies `envelope` as `signer`'s signature over `msg`.
    pub fn verify(
        &self,
        signer: NodeId,
        msg: &[u8],
        envelope: &[u8],
    ) -> Result<(), VerificationError> {
        let envelope = SignatureEnvelope::from_bytes(envelope)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(VerificationError::UnsupportedVersion(envelope.version));
        }

        let key = self.verify_certificate(&envelope.certificate, signer)?;

        let raw: [u8; 64] = envelope.signature.as_slice().try_into().map_err(|_| {
            VerificationError::MalformedEnvelope(format!(
                "signature is {} bytes, expected 64",
                envelope.signature.len()
            ))
        })?;
        key.verify(msg, &Signature::from_bytes(&raw))
            .map_err(|_| VerificationError::SignatureMismatch)
    }

    /// Checks that `der` was issued by the trust root, is currently valid,
    /// carries an Ed25519 key, and names `expected`. Returns the key.
    pub fn verify_certificate(
        &self,
        der: &[u8],
        expected: NodeId,
    ) -> Result<VerifyingKey, VerificationError> {
        let (rest, cert) = X509Certificate::from_der(der)
            .map_err(|e| VerificationError::CertificateInvalid(e.to_string()))?;
        if !rest.is_empty() {
            return Err(VerificationError::CertificateInvalid(
                "trailing bytes after certificate".into(),
            ));
        }

        let (_, root) = X509Certificate::from_der(&self.trust_root).map_err(|e| {
            VerificationError::CertificateInvalid(format!("trust root unreadable: {e}"))
        })?;

        if cert.issuer().as_raw() != root.subject().as_raw() {
            return Err(VerificationError::CertificateInvalid(format!(
                "issuer {} is not the trust root",
                cert.issuer()
            )));
        }
        cert.verify_signature(Some(root.public_key()))
            .map_err(|e| VerificationError::CertificateInvalid(format!("chain: {e}")))?;
        if !cert.validity().is_valid() {
            return Err(VerificationError::CertificateInvalid(
                "outside validity window".into(),
            ));
        }

        let spki = cert.public_key();
        if spki.algorithm.algorithm != OID_SIG_ED25519 {
            return Err(VerificationError::UnsupportedAlgorithm(
                spki.algorithm.algorithm.to_id_string(),
            ));
        }

        let expected_cn = expected.common_name();
        let actual_cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or("<none>");
        if actual_cn != expected_cn {
            debug!(
                "[crypto] certificate for {} presented as {}",
                actual_cn, expected_cn
            );
            return Err(VerificationError::IdentityMismatch {
                expected: expected_cn,
                actual: actual_cn.to_string(),
            });
        }

        let key_bytes: [u8; 32] = spki
            .subject_public_key
            .data
            .as_ref()
            .try_into()
            .map_err(|_| VerificationError::CertificateInvalid("bad Ed25519 key length".into()))?;
        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| VerificationError::CertificateInvalid(e.to_string()))
    }

    /// Reads the node id a certificate claims, without verifying it.
    pub fn claimed_identity(der: &[u8]) -> Option<NodeId> {
        let (_, cert) = X509Certificate::from_der(der).ok()?;
        let cn = cert.subject().iter_common_name().next()?.as_str().ok()?;
        NodeId::from_common_name(cn)
    }
}
