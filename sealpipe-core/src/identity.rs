//! Per-direction session identity.
//!
//! Each peer owns two identities: one that will become its encoder, one
//! that will become its decoder. An identity collects the local key pair,
//! the peer's public key and the nonce/personalization pair. The private
//! key is wiped when the identity is dropped; the shared secret never
//! outlives the codec instantiation that consumes it.

use crate::error::CodecError;
use crate::kex::KeyExchange;
use crate::secret::SecretBytes;

/// Key material for one direction of the channel.
#[derive(Debug)]
pub struct SessionIdentity {
    private: SecretBytes,
    public: Vec<u8>,
    peer_public: Option<Vec<u8>>,
    personalization: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
}

impl SessionIdentity {
    /// Generate a fresh key pair.
    pub fn generate(kex: &impl KeyExchange) -> Result<Self, CodecError> {
        let pair = kex.generate_keypair()?;
        Ok(Self {
            private: pair.private,
            public: pair.public,
            peer_public: None,
            personalization: None,
            nonce: None,
        })
    }

    /// Local public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Peer public key, once received.
    pub fn peer_public_key(&self) -> Option<&[u8]> {
        self.peer_public.as_deref()
    }

    /// Personalization label, once known.
    pub fn personalization(&self) -> Option<&[u8]> {
        self.personalization.as_deref()
    }

    /// Nonce, once known.
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    pub(crate) fn set_peer_public_key(&mut self, key: Vec<u8>) {
        self.peer_public = Some(key);
    }

    pub(crate) fn set_personalization(&mut self, label: Vec<u8>) {
        self.personalization = Some(label);
    }

    pub(crate) fn set_nonce(&mut self, nonce: Vec<u8>) {
        self.nonce = Some(nonce);
    }

    /// Derive the shared secret with the peer.
    ///
    /// # Errors
    ///
    /// Returns `MissingMaterial` before the peer key arrives, or whatever
    /// the key exchange reports for a malformed key.
    pub fn shared_secret(&self, kex: &impl KeyExchange) -> Result<SecretBytes, CodecError> {
        let peer = self
            .peer_public
            .as_deref()
            .ok_or(CodecError::MissingMaterial)?;
        kex.derive_shared_secret(&self.private, peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kex::X25519;

    #[test]
    fn test_fresh_identity_is_empty() {
        let identity = SessionIdentity::generate(&X25519).unwrap();
        assert_eq!(identity.public_key().len(), 32);
        assert!(identity.peer_public_key().is_none());
        assert!(identity.nonce().is_none());
        assert!(identity.personalization().is_none());
    }

    #[test]
    fn test_shared_secret_requires_peer_key() {
        let identity = SessionIdentity::generate(&X25519).unwrap();
        assert_eq!(
            identity.shared_secret(&X25519).unwrap_err(),
            CodecError::MissingMaterial
        );
    }

    #[test]
    fn test_paired_identities_agree() {
        let mut a = SessionIdentity::generate(&X25519).unwrap();
        let mut b = SessionIdentity::generate(&X25519).unwrap();
        a.set_peer_public_key(b.public_key().to_vec());
        b.set_peer_public_key(a.public_key().to_vec());

        let sa = a.shared_secret(&X25519).unwrap();
        let sb = b.shared_secret(&X25519).unwrap();
        assert_eq!(sa.expose(), sb.expose());
    }
}
