use std::process::ExitCode;

use sealpipe_transport::config::{DEFAULT_HOST, DEFAULT_PORT};
use sealpipe_transport::{
    parse_host, parse_port, run_originator, Connection, TransportConfig, TransportError,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, TransportError> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    let host = ask(
        &mut input,
        &mut stdout,
        &format!("Please enter ip address (default {DEFAULT_HOST}): "),
    )
    .await?;
    let port = ask(
        &mut input,
        &mut stdout,
        &format!("Please enter port (default {DEFAULT_PORT}): "),
    )
    .await?;

    let config = TransportConfig::initiator(parse_host(&host), parse_port(&port)?);
    info!(addr = %config.address(), "connecting");
    let mut conn = Connection::connect(config).await?;

    let outcome = run_originator(&mut conn, input, &mut stdout).await?;
    stdout.write_all(b"Connection closed.\n").await?;
    stdout.flush().await?;
    Ok(outcome.exit_code())
}

/// Print `prompt` and read one line. End of input reads as empty.
async fn ask<R, W>(input: &mut R, output: &mut W, prompt: &str) -> Result<String, TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(prompt.as_bytes()).await?;
    output.flush().await?;
    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(line)
}
