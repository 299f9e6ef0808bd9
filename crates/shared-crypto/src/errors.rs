//! Crypto error types.

use thiserror::Error;

/// Key material and encryption errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A PEM file could not be read or contained no matching section.
    #[error("Failed to load {path}: {reason}")]
    Pem { path: String, reason: String },

    /// The private key is not a PKCS#8 Ed25519 key.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The certificate's public key does not belong to the private key.
    #[error("Certificate public key does not match the private key")]
    KeyMismatch,

    /// Point or key rejected for key agreement.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Envelope or message could not be encoded or decoded.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Message version is not understood.
    #[error("Unsupported message version {0}")]
    UnsupportedVersion(u32),

    /// Own certificate failed verification against the trust root.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// Reasons a signature or certificate is rejected.
///
/// Each step of the verification chain has its own variant so callers can
/// tell a forged signature from a misconfigured peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Malformed signature envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Unsupported signature envelope version {0}")]
    UnsupportedVersion(u32),

    #[error("Certificate invalid: {0}")]
    CertificateInvalid(String),

    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Identity mismatch: expected {expected}, certificate names {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Signature does not match message")]
    SignatureMismatch,

    #[error("Signed digest does not match proposal digest")]
    DigestMismatch,
}
