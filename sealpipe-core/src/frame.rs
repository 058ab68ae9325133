//! Wire framing and tags.
//!
//! Wire format:
//! ```text
//! +----------------+----------+----------------------+
//! | LENGTH (4B BE) | TAG (1B) | PAYLOAD (LENGTH B)   |
//! +----------------+----------+----------------------+
//! ```
//!
//! `LENGTH` counts payload bytes only. The tag is an ASCII byte whose
//! meaning depends on the connection phase.

use zeroize::Zeroizing;

use crate::error::{FramingError, ProtocolError};

/// Length prefix size.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Tag size.
pub const TAG_SIZE: usize = 1;

/// Default upper bound on a single payload.
pub const DEFAULT_MAX_PAYLOAD_LENGTH: usize = 1 << 20;

/// Payload of an acknowledge frame.
pub const ACK_PAYLOAD: &[u8] = b"ACK";

/// Payload of an error frame.
pub const ERR_PAYLOAD: &[u8] = b"ERR";

/// One of the four handshake values, named from the sender's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Sender's encoder public key (`1`).
    EncoderKey,
    /// Sender's encoder complement (`2`).
    EncoderComplement,
    /// Sender's decoder public key (`3`).
    DecoderKey,
    /// Sender's decoder complement (`4`).
    DecoderComplement,
}

impl Artifact {
    /// All artifacts in send order.
    pub const ALL: [Artifact; 4] = [
        Artifact::EncoderKey,
        Artifact::EncoderComplement,
        Artifact::DecoderKey,
        Artifact::DecoderComplement,
    ];

    /// Tag byte carrying this artifact.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::EncoderKey => b'1',
            Self::EncoderComplement => b'2',
            Self::DecoderKey => b'3',
            Self::DecoderComplement => b'4',
        }
    }
}

/// Frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Handshake artifact (`1`..`4`).
    Artifact(Artifact),
    /// Acknowledge (`A`).
    Ack,
    /// Protocol error (`E`).
    Error,
    /// Encoded application or diagnostic message (`m`).
    Message,
}

impl Tag {
    /// Parse a tag byte.
    /// Returns error for unknown tags. No fallback. No default.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            b'1' => Ok(Self::Artifact(Artifact::EncoderKey)),
            b'2' => Ok(Self::Artifact(Artifact::EncoderComplement)),
            b'3' => Ok(Self::Artifact(Artifact::DecoderKey)),
            b'4' => Ok(Self::Artifact(Artifact::DecoderComplement)),
            b'A' => Ok(Self::Ack),
            b'E' => Ok(Self::Error),
            b'm' => Ok(Self::Message),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Artifact(artifact) => artifact.to_byte(),
            Self::Ack => b'A',
            Self::Error => b'E',
            Self::Message => b'm',
        }
    }
}

/// A single wire frame.
///
/// The tag is kept as the raw byte; interpretation belongs to the state
/// machine, which must see unknown tags to answer them with `E`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    tag: u8,
    payload: Zeroizing<Vec<u8>>,
}

impl Frame {
    /// Build a frame from a raw tag byte and payload.
    pub fn new(tag: u8, payload: Vec<u8>) -> Self {
        Self {
            tag,
            payload: Zeroizing::new(payload),
        }
    }

    /// Handshake artifact frame.
    pub fn artifact(artifact: Artifact, payload: Vec<u8>) -> Self {
        Self::new(artifact.to_byte(), payload)
    }

    /// Acknowledge frame (`A` / `ACK`).
    pub fn ack() -> Self {
        Self::new(Tag::Ack.to_byte(), ACK_PAYLOAD.to_vec())
    }

    /// Error frame (`E` / `ERR`).
    pub fn error() -> Self {
        Self::new(Tag::Error.to_byte(), ERR_PAYLOAD.to_vec())
    }

    /// Encoded message frame (`m`). Payload is already-encoded ciphertext.
    pub fn message(ciphertext: Vec<u8>) -> Self {
        Self::new(Tag::Message.to_byte(), ciphertext)
    }

    /// Raw tag byte.
    pub fn tag_byte(&self) -> u8 {
        self.tag
    }

    /// Parsed tag.
    pub fn tag(&self) -> Result<Tag, ProtocolError> {
        Tag::from_byte(self.tag)
    }

    /// Get the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and take ownership of the payload.
    pub fn into_payload(self) -> Zeroizing<Vec<u8>> {
        self.payload
    }

    /// Read the length prefix.
    ///
    /// Returns the payload length (not including prefix or tag).
    ///
    /// # Errors
    ///
    /// Returns error if the length exceeds `limit`.
    pub fn read_length(
        bytes: &[u8; LENGTH_PREFIX_SIZE],
        limit: usize,
    ) -> Result<usize, FramingError> {
        let declared = u32::from_be_bytes(*bytes) as usize;
        if declared > limit {
            return Err(FramingError::TooLarge { declared, limit });
        }
        Ok(declared)
    }

    /// Serialize to wire format (length prefix + tag + payload).
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit a 32-bit length prefix.
    pub fn to_wire(&self) -> Result<Vec<u8>, FramingError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| FramingError::TooLarge {
            declared: self.payload.len(),
            limit: u32::MAX as usize,
        })?;

        let mut wire = Vec::with_capacity(LENGTH_PREFIX_SIZE + TAG_SIZE + self.payload.len());
        wire.extend_from_slice(&len.to_be_bytes());
        wire.push(self.tag);
        wire.extend_from_slice(&self.payload);
        Ok(wire)
    }
}
