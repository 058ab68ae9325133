//! Key exchange capability.
//!
//! The handshake only needs two operations: make a key pair, and turn a
//! private key plus a peer public key into a shared secret. Both fail
//! closed: an error never comes with partial output.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::CodecError;
use crate::secret::SecretBytes;

/// X25519 key size (private, public and shared secret).
pub const X25519_KEY_SIZE: usize = 32;

/// A freshly generated local key pair.
#[derive(Debug)]
pub struct KeyPair {
    /// Private half. Wiped on drop.
    pub private: SecretBytes,
    /// Public half, sent to the peer.
    pub public: Vec<u8>,
}

/// Produces key pairs and derives shared secrets.
pub trait KeyExchange {
    /// Generate a new local key pair.
    fn generate_keypair(&self) -> Result<KeyPair, CodecError>;

    /// Derive the shared secret for `private` and the peer's public key.
    fn derive_shared_secret(
        &self,
        private: &SecretBytes,
        peer_public: &[u8],
    ) -> Result<SecretBytes, CodecError>;
}

/// X25519 Diffie-Hellman.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519;

impl KeyExchange for X25519 {
    fn generate_keypair(&self) -> Result<KeyPair, CodecError> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Ok(KeyPair {
            private: SecretBytes::from_array(secret.to_bytes()),
            public: public.as_bytes().to_vec(),
        })
    }

    fn derive_shared_secret(
        &self,
        private: &SecretBytes,
        peer_public: &[u8],
    ) -> Result<SecretBytes, CodecError> {
        let peer: [u8; X25519_KEY_SIZE] = peer_public
            .try_into()
            .map_err(|_| CodecError::MalformedPeerKey)?;
        let mut raw: [u8; X25519_KEY_SIZE] = private
            .expose()
            .try_into()
            .map_err(|_| CodecError::MalformedPrivateKey)?;

        let secret = StaticSecret::from(raw);
        raw.zeroize();

        let shared = secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(CodecError::NonContributory);
        }
        Ok(SecretBytes::new(shared.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = X25519.generate_keypair().unwrap();
        let kp2 = X25519.generate_keypair().unwrap();

        // Each keypair should be unique
        assert_ne!(kp1.public, kp2.public);
        assert_eq!(kp1.public.len(), X25519_KEY_SIZE);
        assert_eq!(kp1.private.len(), X25519_KEY_SIZE);
    }

    #[test]
    fn test_shared_secret_agrees() {
        let a = X25519.generate_keypair().unwrap();
        let b = X25519.generate_keypair().unwrap();

        let ab = X25519.derive_shared_secret(&a.private, &b.public).unwrap();
        let ba = X25519.derive_shared_secret(&b.private, &a.public).unwrap();
        assert_eq!(ab.expose(), ba.expose());
    }

    #[test]
    fn test_malformed_peer_key() {
        let a = X25519.generate_keypair().unwrap();
        assert_eq!(
            X25519.derive_shared_secret(&a.private, &[1, 2, 3]).unwrap_err(),
            CodecError::MalformedPeerKey
        );
        assert_eq!(
            X25519
                .derive_shared_secret(&a.private, &[0u8; 33])
                .unwrap_err(),
            CodecError::MalformedPeerKey
        );
    }

    #[test]
    fn test_low_order_peer_key_rejected() {
        let a = X25519.generate_keypair().unwrap();
        assert_eq!(
            X25519
                .derive_shared_secret(&a.private, &[0u8; X25519_KEY_SIZE])
                .unwrap_err(),
            CodecError::NonContributory
        );
    }
}
