//! Transport configuration.

use std::time::Duration;

use sealpipe_core::frame::DEFAULT_MAX_PAYLOAD_LENGTH;

pub use sealpipe_core::Role;

use crate::error::TransportError;

/// Default peer host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 27015;

/// Default bound on everything before steady state.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a single interactive payload.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 100;

/// Configuration for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Host to dial (initiator) or bind (responder).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Role in the connection (Initiator or Responder)
    pub role: Role,
    /// Deadline covering artifact exchange, ACK and diagnostic.
    pub handshake_timeout: Duration,
    /// Largest payload accepted from the wire.
    pub max_payload_length: usize,
    /// Largest payload accepted from interactive input.
    pub max_input_bytes: usize,
}

impl TransportConfig {
    /// Create a new configuration for an initiator.
    pub fn initiator(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            role: Role::Initiator,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_payload_length: DEFAULT_MAX_PAYLOAD_LENGTH,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    /// Create a new configuration for a responder on the default host.
    pub fn responder(port: u16) -> Self {
        Self {
            role: Role::Responder,
            ..Self::initiator(DEFAULT_HOST, port)
        }
    }

    /// Override the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the handshake deadline.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Override the wire payload limit.
    pub fn with_max_payload_length(mut self, limit: usize) -> Self {
        self.max_payload_length = limit;
        self
    }

    /// Override the interactive input limit.
    pub fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    /// `host:port`, for dialing and binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Interpret a prompted host. An empty answer takes the default.
pub fn parse_host(answer: &str) -> String {
    match answer.trim() {
        "" => DEFAULT_HOST.to_string(),
        host => host.to_string(),
    }
}

/// Interpret a prompted port. An empty answer takes the default.
///
/// # Errors
///
/// Returns `InvalidPort` for anything that is not a port number in `1..=65535`.
pub fn parse_port(answer: &str) -> Result<u16, TransportError> {
    match answer.trim() {
        "" => Ok(DEFAULT_PORT),
        text => match text.parse::<u16>() {
            Ok(0) | Err(_) => Err(TransportError::InvalidPort(text.to_string())),
            Ok(port) => Ok(port),
        },
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::initiator(DEFAULT_HOST, DEFAULT_PORT)
    }
}
