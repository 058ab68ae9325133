//! Connection driver.
//!
//! Binds a [`Session`] to a [`FramedChannel`]: every received frame goes
//! through `Session::dispatch`, every frame it produces is written back
//! in order, and any failure ends the connection.
//!
//! # Invariants
//!
//! - One frame in flight at a time. No pipelining
//! - Everything before steady state runs under `handshake_timeout`
//! - A failure carrying an `E` frame sends it (best effort) before closing
//! - `Connection` does not implement `Clone`

use sealpipe_core::{ConnectionState, Event, Frame, ProtocolError, Role, Session, Step};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::channel::FramedChannel;
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::message::Message;

/// One live connection.
pub struct Connection<S> {
    channel: FramedChannel<S>,
    session: Session,
    config: TransportConfig,
}

impl Connection<TcpStream> {
    /// Dial the configured peer over TCP.
    pub async fn connect(config: TransportConfig) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(config.address()).await?;
        stream.set_nodelay(true)?;
        info!(addr = %config.address(), "connected");
        Self::new(stream, config)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wrap an established stream, creating a session for `config.role`.
    pub fn new(stream: S, config: TransportConfig) -> Result<Self, TransportError> {
        let session = match config.role {
            Role::Initiator => Session::new_initiator()?,
            Role::Responder => Session::new_responder()?,
        };
        Ok(Self::with_session(stream, session, config))
    }

    /// Wrap a stream around a prepared session.
    pub fn with_session(stream: S, session: Session, config: TransportConfig) -> Self {
        Self {
            channel: FramedChannel::new(stream, config.max_payload_length),
            session,
            config,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Our role.
    pub fn role(&self) -> Role {
        self.session.role()
    }

    /// Configuration in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Run artifact exchange, ACK and diagnostic until steady state.
    ///
    /// # Errors
    ///
    /// `HandshakeTimeout` if the deadline passes, `PeerDisconnected` if the
    /// peer closes first, or whatever failure ended the bootstrap.
    pub async fn establish(&mut self) -> Result<(), TransportError> {
        let deadline = self.config.handshake_timeout;
        match tokio::time::timeout(deadline, self.bootstrap()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(state = ?self.session.state(), ?deadline, "handshake timed out");
                self.session.abandon();
                self.channel.shutdown().await;
                Err(TransportError::HandshakeTimeout(deadline))
            }
        }
    }

    async fn bootstrap(&mut self) -> Result<(), TransportError> {
        for frame in self.session.start() {
            self.send(&frame).await?;
        }
        while self.session.state() != ConnectionState::SteadyState {
            self.step().await?;
        }
        info!(role = ?self.session.role(), "secure channel established");
        Ok(())
    }

    /// Receive one frame, dispatch it and send whatever it produces.
    pub async fn step(&mut self) -> Result<Step, TransportError> {
        let frame = self.recv().await?;
        match self.session.dispatch(frame) {
            Ok(step) => {
                for frame in &step.frames {
                    self.send(frame).await?;
                }
                Ok(step)
            }
            Err(failure) => {
                if let Some(notify) = &failure.notify {
                    if let Err(e) = self.channel.send_frame(notify).await {
                        debug!(error = %e, "could not deliver error frame");
                    }
                }
                self.channel.shutdown().await;
                Err(failure.into())
            }
        }
    }

    /// Send a payload and wait for its verified echo. Initiator only.
    pub async fn exchange(&mut self, payload: &[u8]) -> Result<Message, TransportError> {
        let frame = self.session.send_payload(payload)?;
        self.send(&frame).await?;

        let step = self.step().await?;
        match step.event {
            Event::EchoVerified(echo) => Ok(Message::from(echo)),
            _ => Err(self.session.abort(ProtocolError::UnsolicitedEcho).into()),
        }
    }

    /// Echo one payload back to the peer. Responder only.
    pub async fn echo_once(&mut self) -> Result<(), TransportError> {
        let step = self.step().await?;
        match step.event {
            Event::Echoed => Ok(()),
            other => {
                let state = self.session.state();
                debug!(event = ?other, "unexpected event while echoing");
                Err(self.session.abort(ProtocolError::NotReady(state)).into())
            }
        }
    }

    /// Close gracefully.
    pub async fn close(&mut self) {
        self.session.close();
        self.channel.shutdown().await;
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        if self.session.state().is_terminal() {
            return Err(TransportError::SessionTerminated);
        }
        match self.channel.recv_frame().await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => {
                self.session.on_peer_closed();
                Err(TransportError::PeerDisconnected)
            }
            Err(TransportError::Protocol(error)) => {
                let failure = self.session.abort(error);
                self.channel.shutdown().await;
                Err(failure.into())
            }
            Err(e) => {
                self.session.abandon();
                self.channel.shutdown().await;
                Err(e)
            }
        }
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if let Err(e) = self.channel.send_frame(frame).await {
            self.session.abandon();
            return Err(e);
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.session.state())
            .field("role", &self.session.role())
            .field("config", &self.config)
            .finish()
    }
}
