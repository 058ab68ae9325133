//! Protocol errors.
//!
//! All errors are terminal for the connection. There is no recovery.
//! Key material is single-use, so nothing is ever retried.

use thiserror::Error;

use crate::frame::{Artifact, Tag};
use crate::state::ConnectionState;

/// Broad error category, used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated frame. The stream is desynchronized.
    Framing,
    /// Peer broke the bootstrap protocol. The peer is told with an `E` frame.
    Protocol,
    /// Key derivation or codec failure.
    Codec,
    /// Diagnostic probe or echo did not match.
    Integrity,
}

/// Framing failures. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Declared payload length exceeds the configured limit.
    #[error("frame payload of {declared} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Length announced by the prefix.
        declared: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Stream ended after part of a frame was read.
    #[error("connection closed mid-frame")]
    Truncated,
}

/// Key exchange and session codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Peer public key has the wrong shape.
    #[error("malformed peer public key")]
    MalformedPeerKey,

    /// Private key buffer has the wrong shape.
    #[error("malformed private key")]
    MalformedPrivateKey,

    /// Shared secret was all zeros (low-order peer key).
    #[error("shared secret was not contributory")]
    NonContributory,

    /// Nonce, personalization or peer key missing at instantiation time.
    #[error("session material incomplete")]
    MissingMaterial,

    /// Codec could not be instantiated from the supplied material.
    #[error("codec instantiation failed")]
    Instantiate,

    /// Encoding failed.
    #[error("encode failed")]
    Encode,

    /// Ciphertext was rejected (too short, or authentication failed).
    #[error("decode failed")]
    Decode,

    /// The per-direction sequence counter is exhausted.
    #[error("sequence exhausted")]
    SequenceExhausted,
}

impl CodecError {
    /// Whether the codec itself is still usable after this error.
    ///
    /// Only bad input is recoverable at the codec level. The connection
    /// still treats every codec error as fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode | Self::MalformedPeerKey)
    }
}

/// Diagnostic or steady-state integrity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Diagnostic exchange produced something other than the expected text.
    #[error("diagnostic expected {expected:?}")]
    DiagnosticMismatch {
        /// The fixed text that should have been decoded.
        expected: &'static str,
    },

    /// Echo differs from the payload most recently sent.
    #[error("echo does not match the payload sent")]
    EchoMismatch,
}

/// Every way a connection can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Framing failure.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Tag byte outside the protocol alphabet.
    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),

    /// Known tag arriving in a phase that does not accept it.
    #[error("tag {tag:?} not allowed in state {state:?}")]
    UnexpectedTag {
        /// Offending tag.
        tag: Tag,
        /// State at the time of receipt.
        state: ConnectionState,
    },

    /// Same artifact slot filled twice.
    #[error("duplicate artifact {0:?}")]
    DuplicateArtifact(Artifact),

    /// Artifact carried no bytes.
    #[error("empty artifact {0:?}")]
    EmptyArtifact(Artifact),

    /// Peer acknowledged twice.
    #[error("duplicate acknowledge")]
    DuplicateAck,

    /// Acknowledge frame with a payload other than `ACK`.
    #[error("malformed acknowledge")]
    MalformedAck,

    /// Echo arrived while nothing was outstanding.
    #[error("unsolicited echo")]
    UnsolicitedEcho,

    /// Peer sent an `E` frame.
    #[error("peer reported a protocol error")]
    PeerReportedError,

    /// Local operation attempted in a state that does not allow it.
    #[error("operation not allowed in state {0:?}")]
    NotReady(ConnectionState),

    /// Codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Integrity failure.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Connection already reached a terminal state.
    #[error("session terminated")]
    SessionTerminated,
}

impl ProtocolError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Framing(_) => ErrorKind::Framing,
            Self::Codec(_) => ErrorKind::Codec,
            Self::Integrity(_) => ErrorKind::Integrity,
            _ => ErrorKind::Protocol,
        }
    }

    /// Whether the peer should be sent an `E` frame before closing.
    pub fn notifies_peer(&self) -> bool {
        self.kind() == ErrorKind::Protocol
            && !matches!(
                self,
                Self::PeerReportedError | Self::SessionTerminated | Self::NotReady(_)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ProtocolError::from(FramingError::Truncated).kind(),
            ErrorKind::Framing
        );
        assert_eq!(
            ProtocolError::from(CodecError::Decode).kind(),
            ErrorKind::Codec
        );
        assert_eq!(
            ProtocolError::from(IntegrityError::EchoMismatch).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(ProtocolError::UnknownTag(b'z').kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_only_protocol_errors_notify() {
        assert!(ProtocolError::UnknownTag(b'z').notifies_peer());
        assert!(ProtocolError::DuplicateArtifact(Artifact::EncoderKey).notifies_peer());
        assert!(!ProtocolError::PeerReportedError.notifies_peer());
        assert!(!ProtocolError::from(CodecError::Instantiate).notifies_peer());
        assert!(!ProtocolError::from(FramingError::Truncated).notifies_peer());
    }

    #[test]
    fn test_recoverable_codec_status() {
        assert!(CodecError::Decode.is_recoverable());
        assert!(!CodecError::Instantiate.is_recoverable());
        assert!(!CodecError::SequenceExhausted.is_recoverable());
    }

    #[test]
    fn test_display_is_terse() {
        assert_eq!(ProtocolError::UnknownTag(0x7a).to_string(), "unknown tag 0x7a");
        assert_eq!(
            FramingError::TooLarge {
                declared: 10,
                limit: 4
            }
            .to_string(),
            "frame payload of 10 bytes exceeds limit of 4"
        );
    }
}
