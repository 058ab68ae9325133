//! Transport errors.

use std::io;
use std::time::Duration;

use sealpipe_core::{Failure, ProtocolError};
use thiserror::Error;

/// Errors that can occur during transport operations.
///
/// All of them end the connection. `PeerDisconnected` is the only one that
/// counts as a graceful close.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Bootstrap did not reach steady state in time.
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// Protocol-level error from sealpipe-core.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Peer closed the stream.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// Prompted port could not be used.
    #[error("invalid port {0:?}")]
    InvalidPort(String),

    /// Connection has already been closed or failed.
    #[error("session terminated")]
    SessionTerminated,
}

impl TransportError {
    /// Whether this error is really a graceful close.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::PeerDisconnected)
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_graceful() {
            0
        } else {
            1
        }
    }
}

impl From<Failure> for TransportError {
    fn from(failure: Failure) -> Self {
        Self::Protocol(failure.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpipe_core::FramingError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TransportError::PeerDisconnected.exit_code(), 0);
        assert_eq!(
            TransportError::HandshakeTimeout(Duration::from_secs(1)).exit_code(),
            1
        );
        assert_eq!(
            TransportError::from(ProtocolError::from(FramingError::Truncated)).exit_code(),
            1
        );
    }

    #[test]
    fn test_display() {
        let err = TransportError::from(ProtocolError::UnknownTag(b'z'));
        assert_eq!(err.to_string(), "protocol error: unknown tag 0x7a");
    }
}
