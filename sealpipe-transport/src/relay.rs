//! Steady-state relay loops.
//!
//! The originator reads payloads from an input stream, sends each one and
//! checks the echo. The responder echoes until the peer goes away.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::info;
use zeroize::Zeroizing;

use crate::connection::Connection;
use crate::error::TransportError;

/// Input that ends the originator loop.
pub const QUIT_SENTINEL: &str = "quit";

/// How a connection ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Local user asked to stop.
    Quit,
    /// Peer closed the stream.
    PeerClosed,
}

impl Outcome {
    /// Process exit status.
    pub fn exit_code(self) -> u8 {
        0
    }
}

/// Establish the channel, then relay interactive payloads until `quit`.
///
/// Prompts are written to `output`. An empty line, `quit` in any case, or
/// end of input closes the connection without sending anything.
pub async fn run_originator<S, R, W>(
    conn: &mut Connection<S>,
    input: R,
    output: W,
) -> Result<Outcome, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    graceful(originate(conn, input, output).await)
}

/// Establish the channel, then echo payloads until the peer closes.
pub async fn run_responder<S>(conn: &mut Connection<S>) -> Result<Outcome, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    graceful(respond(conn).await)
}

async fn originate<S, R, W>(
    conn: &mut Connection<S>,
    input: R,
    mut output: W,
) -> Result<Outcome, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    conn.establish().await?;
    output.write_all(b"Secure channel established.\n").await?;

    let limit = conn.config().max_input_bytes;
    let mut lines = input.lines();
    loop {
        let prompt = format!("Enter up to {limit} bytes to send (type '{QUIT_SENTINEL}' to end):\n");
        output.write_all(prompt.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            conn.close().await;
            return Ok(Outcome::Quit);
        };
        let line = Zeroizing::new(line);

        if line.is_empty() || line.eq_ignore_ascii_case(QUIT_SENTINEL) {
            info!("closing at user request");
            conn.close().await;
            return Ok(Outcome::Quit);
        }

        if line.len() > limit {
            let notice = format!("Input is {} bytes; the limit is {limit}.\n", line.len());
            output.write_all(notice.as_bytes()).await?;
            continue;
        }

        let echo = conn.exchange(line.as_bytes()).await?;
        let report = format!("Echo verified: {}\n", echo.to_string_lossy());
        output.write_all(report.as_bytes()).await?;
    }
}

async fn respond<S>(conn: &mut Connection<S>) -> Result<Outcome, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.establish().await?;
    loop {
        conn.echo_once().await?;
    }
}

fn graceful(result: Result<Outcome, TransportError>) -> Result<Outcome, TransportError> {
    match result {
        Err(TransportError::PeerDisconnected) => {
            info!("peer closed the connection");
            Ok(Outcome::PeerClosed)
        }
        other => other,
    }
}
