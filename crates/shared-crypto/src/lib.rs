//! # Shared Crypto
//!
//! Certificate-backed node identity and the primitives built on it.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `identity` | Ed25519 + X.509 | Node key material loaded from PEM |
//! | `signatures` | Ed25519, X.509 chain check | Versioned signature envelopes |
//! | `symmetric` | XChaCha20-Poly1305 | AEAD encryption |
//! | `ecies` | X25519 + SHA3-256 + XChaCha20-Poly1305 | Confidential point-to-point payloads |
//!
//! ## Security Properties
//!
//! - **Trust root**: every certificate must be issued by the single configured CA
//! - **Identity binding**: a certificate speaks for node `N` only if its CN is `node{N}`
//! - **Key reuse**: ECIES derives X25519 keys from the same Ed25519 identity keys

#![warn(clippy::all)]

pub mod ecies;
pub mod errors;
pub mod identity;
pub mod signatures;
pub mod symmetric;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use errors::{CryptoError, VerificationError};
pub use identity::{NodeIdentity, TlsPaths};
pub use signatures::{CertificateVerifier, SignatureEnvelope, SignedProposal, ENVELOPE_VERSION};
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey};
