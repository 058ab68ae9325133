//! Sealpipe Protocol Core
//!
//! Socket-free bootstrap protocol for an encrypted, length-framed channel.
//!
//! This crate provides:
//! - Wire framing with strict bounds checking
//! - The four-artifact handshake orchestrator
//! - The connection state machine (`Session::dispatch`)
//! - Key exchange and session codec capabilities behind traits
//!
//! # Invariants
//!
//! - Any protocol violation moves the connection to `Error`
//! - Codecs are instantiated exactly once, after all four artifacts and the peer's ACK
//! - No user payload is accepted before the "ping"/"ack" diagnostic passes
//! - Private keys and shared secrets are wiped on drop, on every path
//! - Direct use of `unsafe` is forbidden (#![forbid(unsafe_code)])

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod identity;
pub mod kex;
pub mod secret;
pub mod state;

pub use codec::{CodecFactory, SealCodec, SessionDecoder, SessionEncoder};
pub use error::{CodecError, ErrorKind, FramingError, IntegrityError, ProtocolError};
pub use frame::{Artifact, Frame, Tag, DEFAULT_MAX_PAYLOAD_LENGTH};
pub use handshake::{Handshake, HandshakeProgress, Role};
pub use kex::{KeyExchange, X25519};
pub use secret::SecretBytes;
pub use state::{ConnectionState, Event, Failure, Session, Step};
