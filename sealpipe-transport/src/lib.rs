//! Sealpipe Transport
//!
//! Async transport for the sealpipe bootstrap protocol.
//!
//! This crate wraps `sealpipe-core` and drives it over any tokio byte
//! stream (TCP in practice): frame I/O, the handshake deadline, and the
//! originator and echo-responder relay loops.
//!
//! # Hard Failures
//!
//! Any error (protocol violation, framing error, codec failure, timeout or
//! transport loss) ends the connection. Only a peer close or a local `quit`
//! counts as a graceful end.
//!
//! - **No Duplication**: `Connection` and `Message` do not implement `Clone`.
//! - **Zeroization**: Decoded plaintext is held in `Zeroizing` buffers.
//! - **Strict Framing**: A stream that ends mid-frame is a framing error, never a short message.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod relay;

pub use channel::FramedChannel;
pub use config::{parse_host, parse_port, Role, TransportConfig};
pub use connection::Connection;
pub use error::TransportError;
pub use message::Message;
pub use relay::{run_originator, run_responder, Outcome, QUIT_SENTINEL};
