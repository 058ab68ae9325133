//! Connection state machine.
//!
//! States: AWAITING_PEER_INFO → AWAITING_ACK → RUNNING_DIAGNOSTIC → STEADY_STATE
//!
//! Any violation moves to ERROR. Stream closure moves to CLOSED.
//! Both are final. No retries. No recovery.
//!
//! [`Session::dispatch`] is the only way a received frame changes state.
//! It never touches a socket: it returns the frames to send and an event
//! describing what happened, so the transition table can be tested
//! without a live connection.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::codec::{CodecFactory, SealCodec, SessionDecoder, SessionEncoder};
use crate::error::{CodecError, IntegrityError, ProtocolError};
use crate::frame::{Artifact, Frame, Tag, ACK_PAYLOAD};
use crate::handshake::{Handshake, HandshakeProgress, Role};
use crate::kex::{KeyExchange, X25519};

/// Probe sent by the initiator once codecs exist.
pub const DIAGNOSTIC_PROBE: &[u8] = b"ping";

/// Responder's answer to the probe.
pub const DIAGNOSTIC_RESPONSE: &[u8] = b"ack";

/// Connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Collecting the peer's four artifacts. Initial state.
    AwaitingPeerInfo,
    /// All artifacts received, ACK sent, waiting for the peer's ACK.
    AwaitingAck,
    /// Codecs instantiated, "ping"/"ack" exchange in progress.
    RunningDiagnostic,
    /// Relaying application payloads.
    SteadyState,
    /// Fatal failure. Final state.
    Error,
    /// Stream closed gracefully. Final state.
    Closed,
}

impl ConnectionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Closed)
    }
}

/// What a dispatched frame accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An artifact was stored.
    ArtifactAccepted(HandshakeProgress),
    /// The peer's ACK arrived before our own progress was complete.
    PeerAcknowledged,
    /// Both codecs were instantiated.
    CodecsReady,
    /// The diagnostic exchange succeeded. Steady state reached.
    DiagnosticPassed,
    /// Responder echoed a payload back.
    Echoed,
    /// Initiator received a matching echo.
    EchoVerified(Zeroizing<Vec<u8>>),
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Frames to send, in order.
    pub frames: Vec<Frame>,
    /// What happened.
    pub event: Event,
}

impl Step {
    fn new(event: Event) -> Self {
        Self {
            frames: Vec::new(),
            event,
        }
    }
}

/// A fatal dispatch outcome. The session is already in a final state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct Failure {
    /// Why the connection failed.
    pub error: ProtocolError,
    /// `E` frame to send before closing, if the peer should be told.
    pub notify: Option<Frame>,
}

/// One side of a connection.
///
/// Owns the handshake until codecs are instantiated, then the codecs.
pub struct Session<K: KeyExchange = X25519, C: CodecFactory = SealCodec> {
    state: ConnectionState,
    role: Role,
    codecs: C,
    handshake: Option<Handshake<K>>,
    progress: HandshakeProgress,
    artifacts_sent: bool,
    peer_acked: bool,
    encoder: Option<C::Encoder>,
    decoder: Option<C::Decoder>,
    // Last payload sent by the initiator, awaiting its echo.
    outstanding: Option<Zeroizing<Vec<u8>>>,
}

impl Session<X25519, SealCodec> {
    /// Create a new session as initiator.
    pub fn new_initiator() -> Result<Self, ProtocolError> {
        let handshake = Handshake::initiator(X25519)?;
        Ok(Self::with_handshake(handshake, SealCodec))
    }

    /// Create a new session as responder, with nonces from the wall clock.
    pub fn new_responder() -> Result<Self, ProtocolError> {
        let handshake = Handshake::responder(X25519, unix_millis(SystemTime::now()))?;
        Ok(Self::with_handshake(handshake, SealCodec))
    }
}

/// Milliseconds since the Unix epoch, saturating at `u64::MAX`.
/// A clock before the epoch reads as zero.
fn unix_millis(now: SystemTime) -> u64 {
    let elapsed = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl<K: KeyExchange, C: CodecFactory> Session<K, C> {
    /// Create a session around a prepared handshake.
    pub fn with_handshake(handshake: Handshake<K>, codecs: C) -> Self {
        Self {
            state: ConnectionState::AwaitingPeerInfo,
            role: handshake.role(),
            codecs,
            handshake: Some(handshake),
            progress: HandshakeProgress::new(),
            artifacts_sent: false,
            peer_acked: false,
            encoder: None,
            decoder: None,
            outstanding: None,
        }
    }

    /// Get current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Artifacts received so far.
    pub fn progress(&self) -> HandshakeProgress {
        self.progress
    }

    /// Whether an echo is outstanding.
    pub fn awaiting_echo(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Frames to send as soon as the stream is up.
    ///
    /// The initiator opens with its four artifacts. The responder sends
    /// nothing until it has the initiator's artifacts.
    pub fn start(&mut self) -> Vec<Frame> {
        if self.role != Role::Initiator || self.artifacts_sent || self.state.is_terminal() {
            return Vec::new();
        }
        let Some(handshake) = self.handshake.as_ref() else {
            return Vec::new();
        };
        self.artifacts_sent = true;
        info!(role = ?self.role, "sending session artifacts");
        handshake.outbound().to_vec()
    }

    /// Process an inbound frame.
    ///
    /// # Errors
    ///
    /// Any violation moves the session to `Error` and returns a [`Failure`]
    /// carrying the `E` frame to send, if any.
    pub fn dispatch(&mut self, frame: Frame) -> Result<Step, Failure> {
        if self.state.is_terminal() {
            return Err(Failure {
                error: ProtocolError::SessionTerminated,
                notify: None,
            });
        }

        let tag = match frame.tag() {
            Ok(tag) => tag,
            Err(e) => return Err(self.fail(e)),
        };
        debug!(state = ?self.state, tag = ?tag, len = frame.payload().len(), "dispatch");

        match self.transition(tag, frame) {
            Ok(step) => Ok(step),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn transition(&mut self, tag: Tag, frame: Frame) -> Result<Step, ProtocolError> {
        match (self.state, tag) {
            (_, Tag::Error) => Err(ProtocolError::PeerReportedError),

            (_, Tag::Ack) => self.on_ack(frame.payload()),

            (ConnectionState::AwaitingPeerInfo, Tag::Artifact(artifact)) => {
                self.on_artifact(artifact, frame.into_payload().to_vec())
            }
            // Every slot is filled once we leave AwaitingPeerInfo.
            (ConnectionState::AwaitingAck, Tag::Artifact(artifact)) => {
                Err(ProtocolError::DuplicateArtifact(artifact))
            }

            (ConnectionState::RunningDiagnostic, Tag::Message) => self.on_diagnostic(frame.payload()),
            (ConnectionState::SteadyState, Tag::Message) => self.on_message(frame.payload()),

            (state, tag) => Err(ProtocolError::UnexpectedTag { tag, state }),
        }
    }

    fn on_artifact(&mut self, artifact: Artifact, payload: Vec<u8>) -> Result<Step, ProtocolError> {
        let handshake = self
            .handshake
            .as_mut()
            .ok_or(ProtocolError::SessionTerminated)?;
        self.progress = handshake.accept(artifact, payload)?;

        if !self.progress.is_complete() {
            return Ok(Step::new(Event::ArtifactAccepted(self.progress)));
        }

        let mut frames = vec![Frame::ack()];
        if !self.artifacts_sent {
            frames.extend(handshake.outbound());
            self.artifacts_sent = true;
        }
        self.state = ConnectionState::AwaitingAck;
        info!(role = ?self.role, "peer artifacts complete, acknowledged");

        if !self.peer_acked {
            return Ok(Step {
                frames,
                event: Event::ArtifactAccepted(self.progress),
            });
        }

        frames.extend(self.instantiate()?);
        Ok(Step {
            frames,
            event: Event::CodecsReady,
        })
    }

    fn on_ack(&mut self, payload: &[u8]) -> Result<Step, ProtocolError> {
        if payload != ACK_PAYLOAD {
            return Err(ProtocolError::MalformedAck);
        }
        if self.peer_acked {
            return Err(ProtocolError::DuplicateAck);
        }
        self.peer_acked = true;

        match self.state {
            ConnectionState::AwaitingPeerInfo => {
                debug!("peer acknowledged ahead of local progress");
                Ok(Step::new(Event::PeerAcknowledged))
            }
            ConnectionState::AwaitingAck => Ok(Step {
                frames: self.instantiate()?,
                event: Event::CodecsReady,
            }),
            state => Err(ProtocolError::UnexpectedTag {
                tag: Tag::Ack,
                state,
            }),
        }
    }

    /// Build both codecs and, on the initiator, emit the probe.
    fn instantiate(&mut self) -> Result<Vec<Frame>, ProtocolError> {
        let handshake = self
            .handshake
            .take()
            .ok_or(ProtocolError::SessionTerminated)?;
        let (encoder, decoder) = handshake.instantiate(&self.codecs)?;
        self.encoder = Some(encoder);
        self.decoder = Some(decoder);
        self.state = ConnectionState::RunningDiagnostic;
        info!(role = ?self.role, "codecs instantiated, running diagnostic");

        match self.role {
            Role::Initiator => Ok(vec![Frame::message(self.encode(DIAGNOSTIC_PROBE)?)]),
            Role::Responder => Ok(Vec::new()),
        }
    }

    fn on_diagnostic(&mut self, ciphertext: &[u8]) -> Result<Step, ProtocolError> {
        let plaintext = self.decode(ciphertext)?;
        let mut step = Step::new(Event::DiagnosticPassed);

        match self.role {
            Role::Responder => {
                if plaintext.as_slice() != DIAGNOSTIC_PROBE {
                    return Err(IntegrityError::DiagnosticMismatch { expected: "ping" }.into());
                }
                step.frames
                    .push(Frame::message(self.encode(DIAGNOSTIC_RESPONSE)?));
            }
            Role::Initiator => {
                if plaintext.as_slice() != DIAGNOSTIC_RESPONSE {
                    return Err(IntegrityError::DiagnosticMismatch { expected: "ack" }.into());
                }
            }
        }

        self.state = ConnectionState::SteadyState;
        info!(role = ?self.role, "diagnostic passed, channel ready");
        Ok(step)
    }

    fn on_message(&mut self, ciphertext: &[u8]) -> Result<Step, ProtocolError> {
        match self.role {
            Role::Responder => {
                let plaintext = self.decode(ciphertext)?;
                let echo = self.encode(&plaintext)?;
                debug!(len = plaintext.len(), "echoing payload");
                Ok(Step {
                    frames: vec![Frame::message(echo)],
                    event: Event::Echoed,
                })
            }
            Role::Initiator => {
                let sent = self
                    .outstanding
                    .take()
                    .ok_or(ProtocolError::UnsolicitedEcho)?;
                let echo = self.decode(ciphertext)?;
                if echo.as_slice() != sent.as_slice() {
                    return Err(IntegrityError::EchoMismatch.into());
                }
                Ok(Step::new(Event::EchoVerified(echo)))
            }
        }
    }

    /// Encode a user payload for sending.
    ///
    /// Initiator only, in steady state, with no echo outstanding.
    ///
    /// # Errors
    ///
    /// Misuse or an encode failure moves the session to `Error`.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<Frame, Failure> {
        if self.state.is_terminal() {
            return Err(Failure {
                error: ProtocolError::SessionTerminated,
                notify: None,
            });
        }
        if self.state != ConnectionState::SteadyState
            || self.role != Role::Initiator
            || self.outstanding.is_some()
        {
            let state = self.state;
            return Err(self.fail(ProtocolError::NotReady(state)));
        }

        match self.encode(payload) {
            Ok(ciphertext) => {
                self.outstanding = Some(Zeroizing::new(payload.to_vec()));
                Ok(Frame::message(ciphertext))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// The peer closed the stream.
    pub fn on_peer_closed(&mut self) {
        if !self.state.is_terminal() {
            info!(state = ?self.state, "peer closed connection");
            self.close();
        }
    }

    /// Close gracefully. Wipes all session material.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Error {
            self.state = ConnectionState::Closed;
        }
        self.wipe();
    }

    /// Move to `Error` for a failure detected outside `dispatch`, such as
    /// a framing error or a timeout. Returns the failure report.
    pub fn abort(&mut self, error: ProtocolError) -> Failure {
        if self.state.is_terminal() {
            return Failure {
                error,
                notify: None,
            };
        }
        self.fail(error)
    }

    /// Move to `Error` without a protocol cause (I/O failure, timeout).
    pub fn abandon(&mut self) {
        if !self.state.is_terminal() {
            warn!(state = ?self.state, "connection abandoned");
            self.state = ConnectionState::Error;
        }
        self.wipe();
    }

    /// Move to `Error`, wipe, and build the failure report.
    fn fail(&mut self, error: ProtocolError) -> Failure {
        warn!(state = ?self.state, error = %error, "connection failed");
        self.state = ConnectionState::Error;
        self.wipe();
        Failure {
            notify: error.notifies_peer().then(Frame::error),
            error,
        }
    }

    fn wipe(&mut self) {
        self.handshake = None;
        self.encoder = None;
        self.decoder = None;
        self.outstanding = None;
    }

    fn encode(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or(CodecError::MissingMaterial)?;
        Ok(encoder.encode(plaintext)?)
    }

    fn decode(&mut self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or(CodecError::MissingMaterial)?;
        Ok(decoder.decode(ciphertext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::frame::ERR_PAYLOAD;

    fn deliver(to: &mut Session, frames: Vec<Frame>) -> Vec<Frame> {
        frames
            .into_iter()
            .flat_map(|f| to.dispatch(f).unwrap().frames)
            .collect()
    }

    /// Run the whole bootstrap with the responder's replies in wire order.
    fn establish() -> (Session, Session) {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();
        let mut to_responder = initiator.start();
        let mut to_initiator = responder.start();
        assert!(to_initiator.is_empty());

        loop {
            if !to_responder.is_empty() {
                let frames = std::mem::take(&mut to_responder);
                to_initiator.extend(deliver(&mut responder, frames));
            } else if !to_initiator.is_empty() {
                let frames = std::mem::take(&mut to_initiator);
                to_responder.extend(deliver(&mut initiator, frames));
            } else {
                break;
            }
        }
        (initiator, responder)
    }

    fn is_artifact(frame: &Frame) -> bool {
        matches!(frame.tag(), Ok(Tag::Artifact(_)))
    }

    #[test]
    fn test_session_creation() {
        let initiator = Session::new_initiator().unwrap();
        assert_eq!(initiator.state(), ConnectionState::AwaitingPeerInfo);
        assert_eq!(initiator.role(), Role::Initiator);

        let responder = Session::new_responder().unwrap();
        assert_eq!(responder.state(), ConnectionState::AwaitingPeerInfo);
        assert_eq!(responder.role(), Role::Responder);
    }

    #[test]
    fn test_start_is_sent_once() {
        let mut initiator = Session::new_initiator().unwrap();
        let frames = initiator.start();
        let tags: Vec<u8> = frames.iter().map(Frame::tag_byte).collect();
        assert_eq!(tags, b"1234");
        assert!(initiator.start().is_empty());
    }

    #[test]
    fn test_full_bootstrap() {
        let (initiator, responder) = establish();
        assert_eq!(initiator.state(), ConnectionState::SteadyState);
        assert_eq!(responder.state(), ConnectionState::SteadyState);
    }

    #[test]
    fn test_responder_acks_then_sends_artifacts() {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();

        let reply = deliver(&mut responder, initiator.start());
        assert_eq!(responder.state(), ConnectionState::AwaitingAck);
        let tags: Vec<u8> = reply.iter().map(Frame::tag_byte).collect();
        assert_eq!(tags, b"A1234");
    }

    #[test]
    fn test_ack_after_artifacts_order() {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();

        let reply = deliver(&mut responder, initiator.start());
        let (artifacts, acks): (Vec<Frame>, Vec<Frame>) = reply.into_iter().partition(is_artifact);

        let out = deliver(&mut initiator, artifacts);
        assert_eq!(initiator.state(), ConnectionState::AwaitingAck);
        assert_eq!(out, vec![Frame::ack()]);

        let step = initiator.dispatch(acks[0].clone()).unwrap();
        assert_eq!(step.event, Event::CodecsReady);
        assert_eq!(initiator.state(), ConnectionState::RunningDiagnostic);
        assert_eq!(step.frames.len(), 1);
        assert_eq!(step.frames[0].tag(), Ok(Tag::Message));

        deliver(&mut responder, out);
        let answer = deliver(&mut responder, step.frames);
        assert_eq!(responder.state(), ConnectionState::SteadyState);
        let step = initiator.dispatch(answer[0].clone()).unwrap();
        assert_eq!(step.event, Event::DiagnosticPassed);
        assert_eq!(initiator.state(), ConnectionState::SteadyState);
    }

    #[test]
    fn test_early_ack_is_recorded() {
        let mut initiator = Session::new_initiator().unwrap();
        initiator.start();
        let step = initiator.dispatch(Frame::ack()).unwrap();
        assert_eq!(step.event, Event::PeerAcknowledged);
        assert!(step.frames.is_empty());
        assert_eq!(initiator.state(), ConnectionState::AwaitingPeerInfo);

        let failure = initiator.dispatch(Frame::ack()).unwrap_err();
        assert_eq!(failure.error, ProtocolError::DuplicateAck);
        assert_eq!(failure.notify, Some(Frame::error()));
    }

    #[test]
    fn test_hello_echo() {
        let (mut initiator, mut responder) = establish();

        let frame = initiator.send_payload(b"hello").unwrap();
        assert_ne!(frame.payload(), b"hello");
        assert!(initiator.awaiting_echo());

        let step = responder.dispatch(frame).unwrap();
        assert_eq!(step.event, Event::Echoed);

        let step = initiator.dispatch(step.frames[0].clone()).unwrap();
        match step.event {
            Event::EchoVerified(echo) => assert_eq!(&echo[..], b"hello"),
            other => panic!("expected verified echo, got {:?}", other),
        }
        assert!(!initiator.awaiting_echo());
    }

    #[test]
    fn test_unknown_tag_during_handshake() {
        for received in 0..4 {
            let mut initiator = Session::new_initiator().unwrap();
            let mut responder = Session::new_responder().unwrap();
            let artifacts = initiator.start();

            deliver(&mut responder, artifacts[..received].to_vec());
            assert_eq!(responder.state(), ConnectionState::AwaitingPeerInfo);

            let failure = responder.dispatch(Frame::new(b'z', vec![1])).unwrap_err();
            assert_eq!(failure.error, ProtocolError::UnknownTag(b'z'));
            let notify = failure.notify.unwrap();
            assert_eq!(notify.tag(), Ok(Tag::Error));
            assert_eq!(notify.payload(), ERR_PAYLOAD);
            assert_eq!(responder.state(), ConnectionState::Error);
        }
    }

    #[test]
    fn test_duplicate_artifact() {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();
        let artifacts = initiator.start();

        responder.dispatch(artifacts[0].clone()).unwrap();
        let failure = responder.dispatch(artifacts[0].clone()).unwrap_err();
        assert_eq!(
            failure.error,
            ProtocolError::DuplicateArtifact(Artifact::EncoderKey)
        );
        assert!(failure.notify.is_some());
        assert_eq!(responder.state(), ConnectionState::Error);
    }

    #[test]
    fn test_artifact_after_completion_is_duplicate() {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();
        let artifacts = initiator.start();
        deliver(&mut responder, artifacts.clone());

        let failure = responder.dispatch(artifacts[2].clone()).unwrap_err();
        assert_eq!(
            failure.error,
            ProtocolError::DuplicateArtifact(Artifact::DecoderKey)
        );
    }

    #[test]
    fn test_message_before_codecs_is_unexpected() {
        let mut responder = Session::new_responder().unwrap();
        let failure = responder.dispatch(Frame::message(vec![1, 2, 3])).unwrap_err();
        assert_eq!(
            failure.error,
            ProtocolError::UnexpectedTag {
                tag: Tag::Message,
                state: ConnectionState::AwaitingPeerInfo
            }
        );
        assert!(failure.notify.is_some());
    }

    #[test]
    fn test_malformed_ack() {
        let mut responder = Session::new_responder().unwrap();
        let failure = responder
            .dispatch(Frame::new(b'A', b"NAK".to_vec()))
            .unwrap_err();
        assert_eq!(failure.error, ProtocolError::MalformedAck);
    }

    #[test]
    fn test_peer_error_frame_is_not_answered() {
        let mut responder = Session::new_responder().unwrap();
        let failure = responder.dispatch(Frame::error()).unwrap_err();
        assert_eq!(failure.error, ProtocolError::PeerReportedError);
        assert!(failure.notify.is_none());
        assert_eq!(responder.state(), ConnectionState::Error);
    }

    #[test]
    fn test_tampered_complement_fails_diagnostic() {
        let mut initiator = Session::new_initiator().unwrap();
        let mut responder = Session::new_responder().unwrap();

        let mut artifacts = initiator.start();
        let mut label = artifacts[1].payload().to_vec();
        label[0] ^= 0x01;
        artifacts[1] = Frame::artifact(Artifact::EncoderComplement, label);

        let reply = deliver(&mut responder, artifacts);
        let to_responder = deliver(&mut initiator, reply);
        let (ack, probe) = (to_responder[0].clone(), to_responder[1].clone());

        responder.dispatch(ack).unwrap();
        let failure = responder.dispatch(probe).unwrap_err();
        assert_eq!(failure.error, ProtocolError::Codec(CodecError::Decode));
        assert_eq!(failure.error.kind(), ErrorKind::Codec);
        assert!(failure.notify.is_none());
        assert_eq!(responder.state(), ConnectionState::Error);
    }

    #[test]
    fn test_unsolicited_echo() {
        let (mut initiator, mut responder) = establish();
        let frame = initiator.send_payload(b"one").unwrap();
        let echo = responder.dispatch(frame).unwrap().frames.remove(0);
        initiator.dispatch(echo.clone()).unwrap();

        let failure = initiator.dispatch(echo).unwrap_err();
        assert_eq!(failure.error, ProtocolError::UnsolicitedEcho);
    }

    #[test]
    fn test_send_before_steady_state_fails() {
        let mut initiator = Session::new_initiator().unwrap();
        let failure = initiator.send_payload(b"test").unwrap_err();
        assert_eq!(
            failure.error,
            ProtocolError::NotReady(ConnectionState::AwaitingPeerInfo)
        );
        assert_eq!(initiator.state(), ConnectionState::Error);
    }

    #[test]
    fn test_responder_cannot_originate() {
        let (_, mut responder) = establish();
        assert!(responder.send_payload(b"x").is_err());
        assert_eq!(responder.state(), ConnectionState::Error);
    }

    #[test]
    fn test_closed_is_final() {
        let (mut initiator, _) = establish();
        initiator.on_peer_closed();
        assert_eq!(initiator.state(), ConnectionState::Closed);
        assert!(!initiator.awaiting_echo());

        let failure = initiator.dispatch(Frame::ack()).unwrap_err();
        assert_eq!(failure.error, ProtocolError::SessionTerminated);
        assert_eq!(initiator.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_abort_on_framing_error() {
        let mut responder = Session::new_responder().unwrap();
        let failure = responder.abort(crate::error::FramingError::Truncated.into());
        assert_eq!(failure.error.kind(), ErrorKind::Framing);
        assert!(failure.notify.is_none());
        assert_eq!(responder.state(), ConnectionState::Error);
    }

    #[test]
    fn test_abandon_is_error() {
        let (mut initiator, _) = establish();
        initiator.abandon();
        assert_eq!(initiator.state(), ConnectionState::Error);
        initiator.close();
        assert_eq!(initiator.state(), ConnectionState::Error);
    }

    #[test]
    fn test_close_mid_handshake_is_graceful() {
        let mut responder = Session::new_responder().unwrap();
        responder.on_peer_closed();
        assert_eq!(responder.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_unix_millis_saturates() {
        use std::time::Duration;

        assert_eq!(unix_millis(UNIX_EPOCH), 0);
        assert_eq!(unix_millis(UNIX_EPOCH + Duration::from_millis(1234)), 1234);
        assert_eq!(unix_millis(UNIX_EPOCH - Duration::from_secs(1)), 0);
        let far = UNIX_EPOCH + Duration::from_secs(u64::MAX / 100);
        assert_eq!(unix_millis(far), u64::MAX);
    }
}
