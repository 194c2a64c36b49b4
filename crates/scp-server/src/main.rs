//! scpd — the Simple Chat Protocol v1.0 reference server.
//!
//! # Usage
//!
//! ```bash
//! scpd --cert cert.pem --key key.pem           # listen on 0.0.0.0:4433
//! scpd --host 127.0.0.1 --port 9000 --cert ... --key ...
//! scpd --max-clients 50 --cert ... --key ...
//! ```
//!
//! # Architecture
//!
//! One task runs the QUIC accept loop (`server::MessageServer`), spawning a
//! further task per connection. Those tasks share a [`app::ServerApp`]: the
//! session registry behind a mutex, plus per-session outboxes for relaying
//! PDUs between connections. There is no persisted state — a restart forgets
//! every session, matching the protocol's statelessness.

mod app;
mod server;
mod tls;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use app::ServerApp;
use clap::Parser;
use scp_core::config::{DEFAULT_MAX_CLIENTS, DEFAULT_PORT};
use server::MessageServer;
use tracing::info;

/// scpd — Simple Chat Protocol v1.0 server.
#[derive(Parser, Debug)]
#[command(name = "scpd", about = "Simple Chat Protocol v1.0 server")]
struct Cli {
    /// Address to bind the QUIC listener to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to a PEM-encoded TLS certificate chain.
    #[arg(long)]
    cert: PathBuf,

    /// Path to the PEM-encoded private key matching `--cert`.
    #[arg(long)]
    key: PathBuf,

    /// Maximum number of simultaneously registered sessions.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let bind_addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;

    let quic_config = tls::server_config(&cli.cert, &cli.key).context("failed to build TLS configuration")?;

    let message_server = MessageServer::bind(bind_addr, quic_config).context("failed to start QUIC server")?;
    let bound_port = message_server.port();
    info!(port = bound_port, max_clients = cli.max_clients, "scpd listening");

    let app = Arc::new(ServerApp::new(cli.max_clients));

    let accept_task = tokio::spawn(message_server.accept_loop(app));

    tokio::select! {
        result = accept_task => {
            if let Err(e) = result {
                anyhow::bail!("accept loop task panicked: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

/// Initializes stderr logging. scpd keeps no state across restarts, so
/// unlike a desktop daemon there is no data directory to also log into —
/// the log level is controlled by the `SCPD_LOG` environment variable,
/// defaulting to `info`.
fn init_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_env("SCPD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
