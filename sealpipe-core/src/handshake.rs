//! Handshake orchestrator.
//!
//! Both peers send the same four artifacts in the same order:
//!
//! | Tag | Sent value                 | Lands in the receiver's   |
//! |-----|----------------------------|---------------------------|
//! | `1` | sender's encoder key       | decoder peer key          |
//! | `2` | sender's encoder complement| decoder complement        |
//! | `3` | sender's decoder key       | encoder peer key          |
//! | `4` | sender's decoder complement| encoder complement        |
//!
//! The complement is asymmetric. The initiator sends personalization
//! labels and receives nonces; the responder sends nonces and receives
//! personalization labels. Swapping them breaks interoperability.

use tracing::debug;
use uuid::Uuid;

use crate::codec::CodecFactory;
use crate::error::{CodecError, ProtocolError};
use crate::frame::{Artifact, Frame};
use crate::identity::SessionIdentity;
use crate::kex::KeyExchange;

/// Responder nonce length.
pub const NONCE_LENGTH: usize = 16;

/// Role in the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Dials out, sends personalization labels, originates payloads.
    Initiator,
    /// Accepts, sends nonces, echoes payloads.
    Responder,
}

impl Role {
    /// What this role transmits as artifacts `2` and `4`.
    pub fn sends(self) -> Complement {
        match self {
            Role::Initiator => Complement::Personalization,
            Role::Responder => Complement::Nonce,
        }
    }

    /// What this role expects in artifacts `2` and `4`.
    pub fn receives(self) -> Complement {
        match self {
            Role::Initiator => Complement::Nonce,
            Role::Responder => Complement::Personalization,
        }
    }
}

/// Kind of value carried in a complement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complement {
    /// Freshness nonce.
    Nonce,
    /// Personalization label.
    Personalization,
}

/// Local slot that a received artifact fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Peer key for the local encoder.
    EncoderPeerKey,
    /// Peer key for the local decoder.
    DecoderPeerKey,
    /// Complement for the local encoder.
    EncoderComplement,
    /// Complement for the local decoder.
    DecoderComplement,
}

impl Slot {
    /// Route a received artifact. The sender's encoder pairs with our decoder.
    pub fn for_received(artifact: Artifact) -> Self {
        match artifact {
            Artifact::EncoderKey => Slot::DecoderPeerKey,
            Artifact::EncoderComplement => Slot::DecoderComplement,
            Artifact::DecoderKey => Slot::EncoderPeerKey,
            Artifact::DecoderComplement => Slot::EncoderComplement,
        }
    }
}

/// Which of the four received artifacts have arrived.
///
/// A value type: filling a slot yields a new record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeProgress {
    encoder_peer_key: bool,
    decoder_peer_key: bool,
    encoder_complement: bool,
    decoder_complement: bool,
}

impl HandshakeProgress {
    /// Nothing received.
    pub const fn new() -> Self {
        Self {
            encoder_peer_key: false,
            decoder_peer_key: false,
            encoder_complement: false,
            decoder_complement: false,
        }
    }

    /// Whether `slot` has been filled.
    pub fn contains(&self, slot: Slot) -> bool {
        match slot {
            Slot::EncoderPeerKey => self.encoder_peer_key,
            Slot::DecoderPeerKey => self.decoder_peer_key,
            Slot::EncoderComplement => self.encoder_complement,
            Slot::DecoderComplement => self.decoder_complement,
        }
    }

    /// Record with `slot` filled.
    pub fn with(self, slot: Slot) -> Self {
        let mut next = self;
        match slot {
            Slot::EncoderPeerKey => next.encoder_peer_key = true,
            Slot::DecoderPeerKey => next.decoder_peer_key = true,
            Slot::EncoderComplement => next.encoder_complement = true,
            Slot::DecoderComplement => next.decoder_complement = true,
        }
        next
    }

    /// All four artifacts received.
    pub fn is_complete(&self) -> bool {
        self.encoder_peer_key
            && self.decoder_peer_key
            && self.encoder_complement
            && self.decoder_complement
    }
}

/// Encoder and decoder nonces derived from a millisecond timestamp.
///
/// Encoder: big-endian, left-padded to 16 bytes.
/// Decoder: little-endian, right-padded to 16 bytes.
pub fn timestamp_nonces(millis: u64) -> ([u8; NONCE_LENGTH], [u8; NONCE_LENGTH]) {
    let mut encoder = [0u8; NONCE_LENGTH];
    encoder[NONCE_LENGTH - 8..].copy_from_slice(&millis.to_be_bytes());
    let mut decoder = [0u8; NONCE_LENGTH];
    decoder[..8].copy_from_slice(&millis.to_le_bytes());
    (encoder, decoder)
}

/// Drives artifact exchange for both directions.
pub struct Handshake<K: KeyExchange> {
    role: Role,
    kex: K,
    encoder: SessionIdentity,
    decoder: SessionIdentity,
    progress: HandshakeProgress,
}

impl<K: KeyExchange> Handshake<K> {
    /// Initiator with fresh random personalization labels.
    pub fn initiator(kex: K) -> Result<Self, CodecError> {
        let encoder_label = Uuid::new_v4().to_string().into_bytes();
        let decoder_label = Uuid::new_v4().to_string().into_bytes();
        Self::with_complements(kex, Role::Initiator, encoder_label, decoder_label)
    }

    /// Responder with nonces derived from `timestamp_millis`.
    pub fn responder(kex: K, timestamp_millis: u64) -> Result<Self, CodecError> {
        let (encoder_nonce, decoder_nonce) = timestamp_nonces(timestamp_millis);
        Self::with_complements(
            kex,
            Role::Responder,
            encoder_nonce.to_vec(),
            decoder_nonce.to_vec(),
        )
    }

    /// Handshake with explicit local complements.
    ///
    /// The complements are interpreted as `role.sends()`.
    pub fn with_complements(
        kex: K,
        role: Role,
        encoder_complement: Vec<u8>,
        decoder_complement: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let mut encoder = SessionIdentity::generate(&kex)?;
        let mut decoder = SessionIdentity::generate(&kex)?;
        match role.sends() {
            Complement::Personalization => {
                encoder.set_personalization(encoder_complement);
                decoder.set_personalization(decoder_complement);
            }
            Complement::Nonce => {
                encoder.set_nonce(encoder_complement);
                decoder.set_nonce(decoder_complement);
            }
        }
        Ok(Self {
            role,
            kex,
            encoder,
            decoder,
            progress: HandshakeProgress::new(),
        })
    }

    /// Our role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current progress.
    pub fn progress(&self) -> HandshakeProgress {
        self.progress
    }

    /// Identity that will become the encoder.
    pub fn encoder_identity(&self) -> &SessionIdentity {
        &self.encoder
    }

    /// Identity that will become the decoder.
    pub fn decoder_identity(&self) -> &SessionIdentity {
        &self.decoder
    }

    fn local_complement(identity: &SessionIdentity, kind: Complement) -> Vec<u8> {
        let value = match kind {
            Complement::Nonce => identity.nonce(),
            Complement::Personalization => identity.personalization(),
        };
        value.map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// The four frames to send, in tag order.
    pub fn outbound(&self) -> [Frame; 4] {
        let kind = self.role.sends();
        [
            Frame::artifact(Artifact::EncoderKey, self.encoder.public_key().to_vec()),
            Frame::artifact(
                Artifact::EncoderComplement,
                Self::local_complement(&self.encoder, kind),
            ),
            Frame::artifact(Artifact::DecoderKey, self.decoder.public_key().to_vec()),
            Frame::artifact(
                Artifact::DecoderComplement,
                Self::local_complement(&self.decoder, kind),
            ),
        ]
    }

    /// Store a received artifact.
    ///
    /// # Errors
    ///
    /// Returns error if the artifact is empty or its slot is already filled.
    pub fn accept(
        &mut self,
        artifact: Artifact,
        payload: Vec<u8>,
    ) -> Result<HandshakeProgress, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyArtifact(artifact));
        }

        let slot = Slot::for_received(artifact);
        if self.progress.contains(slot) {
            return Err(ProtocolError::DuplicateArtifact(artifact));
        }

        let kind = self.role.receives();
        let identity = match slot {
            Slot::EncoderPeerKey | Slot::EncoderComplement => &mut self.encoder,
            Slot::DecoderPeerKey | Slot::DecoderComplement => &mut self.decoder,
        };
        match (slot, kind) {
            (Slot::EncoderPeerKey | Slot::DecoderPeerKey, _) => {
                identity.set_peer_public_key(payload)
            }
            (_, Complement::Nonce) => identity.set_nonce(payload),
            (_, Complement::Personalization) => identity.set_personalization(payload),
        }

        self.progress = self.progress.with(slot);
        debug!(?artifact, ?slot, complete = self.progress.is_complete(), "artifact accepted");
        Ok(self.progress)
    }

    /// Derive shared secrets and instantiate both codecs.
    ///
    /// Consumes the handshake, so instantiation happens at most once and
    /// all key material is wiped when this returns.
    ///
    /// # Errors
    ///
    /// Returns error if progress is incomplete or any derivation or
    /// instantiation step fails.
    pub fn instantiate<C: CodecFactory>(
        self,
        codecs: &C,
    ) -> Result<(C::Encoder, C::Decoder), ProtocolError> {
        if !self.progress.is_complete() {
            return Err(CodecError::MissingMaterial.into());
        }

        let (encoder_nonce, encoder_label) = material(&self.encoder)?;
        debug!(
            public_key = %hex::encode(self.encoder.public_key()),
            nonce = %hex::encode(encoder_nonce),
            personalization = %String::from_utf8_lossy(encoder_label),
            "instantiating encoder"
        );
        let entropy = self.encoder.shared_secret(&self.kex)?;
        let encoder = codecs.instantiate_encoder(entropy, encoder_nonce, encoder_label)?;

        let (decoder_nonce, decoder_label) = material(&self.decoder)?;
        debug!(
            public_key = %hex::encode(self.decoder.public_key()),
            nonce = %hex::encode(decoder_nonce),
            personalization = %String::from_utf8_lossy(decoder_label),
            "instantiating decoder"
        );
        let entropy = self.decoder.shared_secret(&self.kex)?;
        let decoder = codecs.instantiate_decoder(entropy, decoder_nonce, decoder_label)?;

        Ok((encoder, decoder))
    }
}

fn material(identity: &SessionIdentity) -> Result<(&[u8], &[u8]), CodecError> {
    match (identity.nonce(), identity.personalization()) {
        (Some(nonce), Some(label)) => Ok((nonce, label)),
        _ => Err(CodecError::MissingMaterial),
    }
}
