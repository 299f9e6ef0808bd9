//! # ECIES over Node Identity Keys
//!
//! Encrypts to a peer using the Ed25519 key from its certificate. Both sides
//! map their Ed25519 keys to X25519 (Montgomery form); the sender uses a fresh
//! ephemeral key per message. The shared secret is hashed with SHA3-256 into
//! an XChaCha20-Poly1305 key.
//!
//! Wire format: encoded [`EciesMessage`].

use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_types::{decode, encode};
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::symmetric::{self, Nonce, SecretKey};

pub const ECIES_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EciesMessage {
    pub version: u32,
    /// Sender's ephemeral X25519 public key.
    pub ephemeral_public: [u8; 32],
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` for the holder of `recipient`.
pub fn encrypt(recipient: &VerifyingKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut ephemeral = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(&mut *ephemeral);

    let ephemeral_public = MontgomeryPoint::mul_base_clamped(*ephemeral);
    let shared = recipient.to_montgomery().mul_clamped(*ephemeral);
    let key = derive_key(&shared)?;

    let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext)?;
    encode(&EciesMessage {
        version: ECIES_VERSION,
        ephemeral_public: ephemeral_public.to_bytes(),
        nonce: *nonce.as_bytes(),
        ciphertext,
    })
    .map_err(|e| CryptoError::Malformed(e.to_string()))
}

/// Decrypts a message produced by [`encrypt`] for `key`'s public half.
pub fn decrypt(key: &SigningKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let message: EciesMessage =
        decode("ecies message", message).map_err(|e| CryptoError::Malformed(e.to_string()))?;
    if message.version != ECIES_VERSION {
        return Err(CryptoError::UnsupportedVersion(message.version));
    }

    let scalar = Zeroizing::new(key.to_scalar_bytes());
    let shared = MontgomeryPoint(message.ephemeral_public).mul_clamped(*scalar);
    let key = derive_key(&shared)?;

    symmetric::decrypt(&key, &message.ciphertext, &Nonce::from_bytes(message.nonce))
}

fn derive_key(shared: &MontgomeryPoint) -> Result<SecretKey, CryptoError> {
    let bytes = Zeroizing::new(shared.to_bytes());
    if bytes.iter().all(|b| *b == 0) {
        return Err(CryptoError::InvalidPublicKey("low-order point".into()));
    }
    Ok(SecretKey::derive(&bytes[..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> SigningKey {
        SigningKey::generate(&mut rand::thread_rng())
    }

    #[test]
    fn test_encrypt_decrypt() {
        let recipient = keypair();
        let message = encrypt(&recipient.verifying_key(), b"job ticket 42").unwrap();
        assert_eq!(decrypt(&recipient, &message).unwrap(), b"job ticket 42");
    }

    #[test]
    fn test_other_key_cannot_decrypt() {
        let recipient = keypair();
        let eavesdropper = keypair();
        let message = encrypt(&recipient.verifying_key(), b"secret").unwrap();
        assert!(matches!(
            decrypt(&eavesdropper, &message),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_ephemeral_key_is_fresh() {
        let recipient = keypair();
        let a = encrypt(&recipient.verifying_key(), b"same").unwrap();
        let b = encrypt(&recipient.verifying_key(), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_low_order_ephemeral_rejected() {
        let recipient = keypair();
        let forged = encode(&EciesMessage {
            version: ECIES_VERSION,
            ephemeral_public: [0u8; 32],
            nonce: [0u8; 24],
            ciphertext: vec![0u8; 32],
        })
        .unwrap();
        assert!(matches!(
            decrypt(&recipient, &forged),
            Err(CryptoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_version_checked() {
        let recipient = keypair();
        let bytes = encrypt(&recipient.verifying_key(), b"x").unwrap();
        let mut message: EciesMessage = decode("ecies message", &bytes).unwrap();
        message.version = 2;
        let bytes = encode(&message).unwrap();
        assert!(matches!(
            decrypt(&recipient, &bytes),
            Err(CryptoError::UnsupportedVersion(2))
        ));
    }
}
