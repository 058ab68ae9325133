//! Sealpipe echo server.
//!
//! Accepts exactly one connection, bootstraps the secure channel as
//! responder and echoes every payload until the client goes away.

use sealpipe_transport::{run_responder, Connection, Outcome, Role, TransportConfig, TransportError};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serve a single client on `listener`.
///
/// `config.role` is forced to `Responder`.
pub async fn run_server(
    listener: TcpListener,
    config: TransportConfig,
) -> Result<Outcome, TransportError> {
    let config = TransportConfig {
        role: Role::Responder,
        ..config
    };

    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    info!(%peer, "client connected");

    let mut conn = Connection::new(stream, config)?;
    let outcome = run_responder(&mut conn).await;
    match &outcome {
        Ok(outcome) => info!(?outcome, "connection closed"),
        Err(e) => error!(error = %e, "connection failed"),
    }
    outcome
}
