//! Session codec capability.
//!
//! A codec is instantiated once per direction from entropy (the shared
//! secret), a nonce and a personalization label. The encoder on one peer
//! and the decoder on the other are built from identical material and
//! then advance in lockstep.
//!
//! `SealCodec` is the bundled implementation:
//!
//! ```text
//! okm    = HKDF-SHA256(salt = nonce, ikm = entropy, info = personalization)
//! key    = okm[0..32]                 (ChaCha20-Poly1305)
//! prefix = okm[32..36]
//! nonce  = prefix || sequence (u64 BE), sequence += 1 per message
//! ```

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CodecError;
use crate::secret::SecretBytes;

const KEY_SIZE: usize = 32;
const PREFIX_SIZE: usize = 4;
const NONCE_SIZE: usize = 12;

/// Authentication tag appended to every ciphertext.
pub const TAG_OVERHEAD: usize = 16;

/// Associated data bound into every message.
const MESSAGE_AAD: &[u8] = b"sealpipe/message/v1";

/// Turns plaintext into ciphertext for one direction.
pub trait SessionEncoder: Send {
    /// Encode one message.
    fn encode(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Turns ciphertext back into plaintext for one direction.
pub trait SessionDecoder: Send {
    /// Decode one message.
    fn decode(&mut self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CodecError>;
}

/// Builds encoders and decoders from exchanged session material.
///
/// `entropy` is moved in and wiped when instantiation returns, whether it
/// succeeds or not.
pub trait CodecFactory {
    /// Encoder type.
    type Encoder: SessionEncoder;
    /// Decoder type.
    type Decoder: SessionDecoder;

    /// Instantiate an encoder.
    fn instantiate_encoder(
        &self,
        entropy: SecretBytes,
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<Self::Encoder, CodecError>;

    /// Instantiate a decoder.
    fn instantiate_decoder(
        &self,
        entropy: SecretBytes,
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<Self::Decoder, CodecError>;
}

/// HKDF + ChaCha20-Poly1305 codec factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealCodec;

/// Keyed state shared by both directions.
struct Keyed {
    cipher: ChaCha20Poly1305,
    prefix: [u8; PREFIX_SIZE],
    sequence: u64,
}

impl Keyed {
    fn derive(
        entropy: SecretBytes,
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<Self, CodecError> {
        if entropy.is_empty() || nonce.is_empty() || personalization.is_empty() {
            return Err(CodecError::MissingMaterial);
        }

        let prk = Hkdf::<Sha256>::new(Some(nonce), entropy.expose());
        drop(entropy);

        let mut okm = Zeroizing::new([0u8; KEY_SIZE + PREFIX_SIZE]);
        prk.expand(personalization, &mut okm[..])
            .map_err(|_| CodecError::Instantiate)?;

        let cipher = ChaCha20Poly1305::new_from_slice(&okm[..KEY_SIZE])
            .map_err(|_| CodecError::Instantiate)?;
        let mut prefix = [0u8; PREFIX_SIZE];
        prefix.copy_from_slice(&okm[KEY_SIZE..]);

        Ok(Self {
            cipher,
            prefix,
            sequence: 0,
        })
    }

    /// Nonce for the current sequence number, then advance.
    fn next_nonce(&mut self) -> Result<[u8; NONCE_SIZE], CodecError> {
        if self.sequence == u64::MAX {
            return Err(CodecError::SequenceExhausted);
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..PREFIX_SIZE].copy_from_slice(&self.prefix);
        nonce[PREFIX_SIZE..].copy_from_slice(&self.sequence.to_be_bytes());
        self.sequence += 1;
        Ok(nonce)
    }
}

/// Encoder half of [`SealCodec`].
pub struct SealEncoder(Keyed);

/// Decoder half of [`SealCodec`].
pub struct SealDecoder(Keyed);

impl SessionEncoder for SealEncoder {
    fn encode(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let nonce = self.0.next_nonce()?;
        self.0
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: MESSAGE_AAD,
                },
            )
            .map_err(|_| CodecError::Encode)
    }
}

impl SessionDecoder for SealDecoder {
    fn decode(&mut self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CodecError> {
        if ciphertext.len() < TAG_OVERHEAD {
            return Err(CodecError::Decode);
        }
        let nonce = self.0.next_nonce()?;
        self.0
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: MESSAGE_AAD,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| CodecError::Decode)
    }
}

impl CodecFactory for SealCodec {
    type Encoder = SealEncoder;
    type Decoder = SealDecoder;

    fn instantiate_encoder(
        &self,
        entropy: SecretBytes,
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<SealEncoder, CodecError> {
        Keyed::derive(entropy, nonce, personalization).map(SealEncoder)
    }

    fn instantiate_decoder(
        &self,
        entropy: SecretBytes,
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<SealDecoder, CodecError> {
        Keyed::derive(entropy, nonce, personalization).map(SealDecoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NONCE: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6];
    const LABEL: &[u8] = b"6F1C3B2A-0D4E-4F5A-8B9C-0123456789AB";

    fn entropy() -> SecretBytes {
        SecretBytes::new(vec![0x42; 32])
    }

    fn pair(nonce: &[u8], label: &[u8]) -> (SealEncoder, SealDecoder) {
        let enc = SealCodec.instantiate_encoder(entropy(), NONCE, LABEL).unwrap();
        let dec = SealCodec.instantiate_decoder(entropy(), nonce, label).unwrap();
        (enc, dec)
    }

    #[test]
    fn test_encode_decode() {
        let (mut enc, mut dec) = pair(NONCE, LABEL);
        for text in [&b"ping"[..], b"ack", b"hello"] {
            let ciphertext = enc.encode(text).unwrap();
            assert_ne!(&ciphertext[..], text);
            assert_eq!(ciphertext.len(), text.len() + TAG_OVERHEAD);
            assert_eq!(&dec.decode(&ciphertext).unwrap()[..], text);
        }
    }

    #[test]
    fn test_same_plaintext_encodes_differently() {
        let (mut enc, _) = pair(NONCE, LABEL);
        assert_ne!(enc.encode(b"ping").unwrap(), enc.encode(b"ping").unwrap());
    }

    #[test]
    fn test_mismatched_nonce_fails() {
        let mut nonce = NONCE.to_vec();
        nonce[15] ^= 0x01;
        let (mut enc, mut dec) = pair(&nonce, LABEL);
        let ciphertext = enc.encode(b"ping").unwrap();
        assert_eq!(dec.decode(&ciphertext).unwrap_err(), CodecError::Decode);
    }

    #[test]
    fn test_mismatched_personalization_fails() {
        let (mut enc, mut dec) = pair(NONCE, b"some other label");
        let ciphertext = enc.encode(b"ping").unwrap();
        assert_eq!(dec.decode(&ciphertext).unwrap_err(), CodecError::Decode);
    }

    #[test]
    fn test_out_of_order_fails() {
        let (mut enc, mut dec) = pair(NONCE, LABEL);
        let _first = enc.encode(b"one").unwrap();
        let second = enc.encode(b"two").unwrap();
        assert_eq!(dec.decode(&second).unwrap_err(), CodecError::Decode);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (mut enc, mut dec) = pair(NONCE, LABEL);
        let mut ciphertext = enc.encode(b"Secret message").unwrap();
        ciphertext[0] ^= 0xFF;
        assert_eq!(dec.decode(&ciphertext).unwrap_err(), CodecError::Decode);
    }

    #[test]
    fn test_short_ciphertext_is_recoverable_input_error() {
        let (_, mut dec) = pair(NONCE, LABEL);
        let err = dec.decode(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, CodecError::Decode);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_material() {
        let err = SealCodec
            .instantiate_encoder(entropy(), &[], LABEL)
            .err()
            .unwrap();
        assert_eq!(err, CodecError::MissingMaterial);
        let err = SealCodec
            .instantiate_decoder(SecretBytes::new(Vec::new()), NONCE, LABEL)
            .err()
            .unwrap();
        assert_eq!(err, CodecError::MissingMaterial);
    }

    #[test]
    fn test_sequence_exhausted() {
        let (mut enc, _) = pair(NONCE, LABEL);
        enc.0.sequence = u64::MAX;
        assert_eq!(enc.encode(b"x").unwrap_err(), CodecError::SequenceExhausted);
    }

    proptest! {
        #[test]
        fn prop_paired_codecs_round_trip(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..512), 1..16)
        ) {
            let (mut enc, mut dec) = pair(NONCE, LABEL);
            for payload in &payloads {
                let ciphertext = enc.encode(payload).unwrap();
                let plaintext = dec.decode(&ciphertext).unwrap();
                prop_assert_eq!(&plaintext[..], &payload[..]);
            }
        }
    }
}
