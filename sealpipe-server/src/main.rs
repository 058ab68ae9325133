use std::process::ExitCode;

use sealpipe_server::run_server;
use sealpipe_transport::config::DEFAULT_PORT;
use sealpipe_transport::{parse_port, TransportConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Listen on every interface; the client chooses which one to dial.
const LISTEN_HOST: &str = "0.0.0.0";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let prompt = format!("Please enter port to listen on (default {DEFAULT_PORT}): ");
    let answer = async {
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        lines.next_line().await
    }
    .await;
    let port = match answer.map(|line| parse_port(&line.unwrap_or_default())) {
        Ok(Ok(port)) => port,
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
        Err(e) => {
            eprintln!("Error: failed to read port: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = TransportConfig::responder(port).with_host(LISTEN_HOST);
    let listener = match TcpListener::bind(config.address()).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: failed to bind {}: {e}", config.address());
            return ExitCode::FAILURE;
        }
    };
    println!("Listening for a client on port {port}...");

    match run_server(listener, config).await {
        Ok(outcome) => {
            println!("Client disconnected.");
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
