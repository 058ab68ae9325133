//! Framed channel over a byte stream.
//!
//! # Frame Handling Invariants
//!
//! - One `send_frame()` = one coalesced write + flush
//! - One `recv_frame()` = exactly one frame, reassembled across partial reads
//! - EOF before the first byte of a frame is a clean close
//! - EOF anywhere inside a frame is `FramingError::Truncated`
//! - Oversized lengths are rejected before the payload is allocated

use std::io;

use sealpipe_core::frame::{Frame, LENGTH_PREFIX_SIZE, TAG_SIZE};
use sealpipe_core::{FramingError, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::TransportError;

/// Length-prefixed, tagged frames over any async stream.
///
/// Does not implement `Clone` to prevent socket duplication.
#[derive(Debug)]
pub struct FramedChannel<S> {
    stream: S,
    max_payload_length: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedChannel<S> {
    /// Wrap a stream.
    pub fn new(stream: S, max_payload_length: usize) -> Self {
        Self {
            stream,
            max_payload_length,
        }
    }

    /// Write one frame.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let wire = Zeroizing::new(frame.to_wire().map_err(ProtocolError::from)?);
        trace!(tag = frame.tag_byte(), len = frame.payload().len(), "send frame");
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` if the peer closed the stream between frames.
    pub async fn recv_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match fill(&mut self.stream, &mut prefix).await? {
            0 => return Ok(None),
            LENGTH_PREFIX_SIZE => {}
            _ => return Err(truncated()),
        }

        let len = Frame::read_length(&prefix, self.max_payload_length)
            .map_err(ProtocolError::from)?;

        let mut tag = [0u8; TAG_SIZE];
        read_exact(&mut self.stream, &mut tag).await?;

        let mut payload = vec![0u8; len];
        read_exact(&mut self.stream, &mut payload).await?;

        trace!(tag = tag[0], len, "recv frame");
        Ok(Some(Frame::new(tag[0], payload)))
    }

    /// Best-effort shutdown of the write half.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

fn truncated() -> TransportError {
    ProtocolError::from(FramingError::Truncated).into()
}

/// Read until `buf` is full or EOF. Returns the number of bytes read.
async fn fill<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn read_exact<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(truncated()),
        Err(e) => Err(e.into()),
    }
}
