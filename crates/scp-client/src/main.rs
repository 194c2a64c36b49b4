//! scp-client — the Simple Chat Protocol v1.0 reference terminal client.
//!
//! # Usage
//!
//! ```bash
//! scp-client alice 127.0.0.1 4433
//! scp-client alice chat.example.com   # default port 4433
//! ```
//!
//! # Architecture
//!
//! One task connects to the server over QUIC (`connection::connect`) and
//! opens the session's single bidirectional stream. A second task reads
//! that stream, decodes PDUs with `scp_core::codec`, and forwards whole
//! PDUs to the main task over a channel; the main task owns the send half
//! of the stream directly, since every write is just a `write_pdu` call
//! away. The main task's `tokio::select!` loop drives `ClientApp`
//! (wrapping `scp_core::client_fsm::ClientSession`) from three event
//! sources: terminal input, inbound PDUs, and a redraw tick — the same
//! shape `familycom/src/main.rs`'s TUI loop uses.

mod app;
mod connection;
mod event;
mod ui;

use std::time::Duration;

use anyhow::{Context, Result};
use app::{Action, ClientApp};
use bytes::BytesMut;
use clap::Parser;
use crossterm::{
    event::EventStream,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use quinn::RecvStream;
use ratatui::prelude::*;
use scp_core::client_fsm::TransportEvent;
use scp_core::codec::{self, CodecError, DecodeOutcome, Pdu};
use scp_core::config::DEFAULT_PORT;
use scp_core::types::Username;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::warn;

/// scp-client — Simple Chat Protocol v1.0 terminal client.
#[derive(Parser, Debug)]
#[command(name = "scp-client", about = "Simple Chat Protocol v1.0 terminal client")]
struct Cli {
    /// Username to claim via CONNECT_REQ.
    username: String,

    /// Server host (DNS name or IP literal).
    server_host: String,

    /// Server UDP port.
    #[arg(default_value_t = DEFAULT_PORT)]
    server_port: u16,
}

/// Events the network-reading task hands back to the main loop.
enum NetEvent {
    Pdu(Pdu),
    CodecError(CodecError),
    Closed,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("SCP_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env("SCP_LOG"))
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    Username::new(cli.username.clone()).context("invalid username")?;

    let streams = connection::connect(&cli.server_host, cli.server_port)
        .await
        .with_context(|| format!("failed to connect to {}:{}", cli.server_host, cli.server_port))?;

    let (net_tx, net_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_loop(streams.recv, net_tx));

    run_tui(cli.username, streams.send, net_rx).await
}

/// Reads PDUs off the session stream until it closes, forwarding each to
/// the main loop. Mirrors `scp-server::server::read_one`'s accumulate-then-
/// decode loop.
async fn read_loop(mut recv: RecvStream, tx: mpsc::UnboundedSender<NetEvent>) {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        match codec::decode_from(&mut buf) {
            Ok(DecodeOutcome::Complete { pdu, .. }) => {
                if tx.send(NetEvent::Pdu(pdu)).is_err() {
                    return;
                }
                continue;
            }
            Ok(DecodeOutcome::NeedMore) => {}
            Err(e) => {
                let _ = tx.send(NetEvent::CodecError(e));
                return;
            }
        }

        let mut chunk = [0u8; 4096];
        match recv.read(&mut chunk).await {
            Ok(Some(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(None) => {
                let _ = tx.send(NetEvent::Closed);
                return;
            }
            Err(e) => {
                warn!(error = %e, "session stream read error");
                let _ = tx.send(NetEvent::Closed);
                return;
            }
        }
    }
}

/// Runs the interactive TUI main loop, taking over the terminal until the
/// user quits or the connection is lost.
async fn run_tui(
    username: String,
    mut send: quinn::SendStream,
    mut net_rx: mpsc::UnboundedReceiver<NetEvent>,
) -> Result<()> {
    enable_raw_mode()?;
    std::io::stdout().execute(EnterAlternateScreen)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = std::io::stdout().execute(LeaveAlternateScreen);
        original_hook(info);
    }));

    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    let mut app = ClientApp::new(username);
    let mut event_stream = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    // Our connection is already established by the time the TUI starts, so
    // the handshake-completed transport event fires immediately, producing
    // the CONNECT_REQ.
    apply_network_actions(&mut send, app.on_transport_event(TransportEvent::HandshakeCompleted)).await;

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(evt)) => {
                        if let Some(action) = event::handle_event(&evt) {
                            let net = app.handle_action(action);
                            apply_network_actions(&mut send, net).await;
                        }
                    }
                    Some(Err(_)) => {}
                    None => break,
                }
            }

            net_event = net_rx.recv() => {
                match net_event {
                    Some(NetEvent::Pdu(pdu)) => {
                        let net = app.on_pdu(pdu);
                        apply_network_actions(&mut send, net).await;
                    }
                    Some(NetEvent::CodecError(e)) => {
                        app.scrollback.push(format!("malformed message from server: {e}"));
                    }
                    Some(NetEvent::Closed) | None => {
                        app.on_transport_event(TransportEvent::ConnectionTerminated);
                    }
                }
            }

            _ = tick.tick() => {}
        }

        if app.should_quit {
            let net = app.handle_action(Action::Quit);
            apply_network_actions(&mut send, net).await;
            break;
        }
    }

    disable_raw_mode()?;
    std::io::stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Writes any PDUs the app produced and, if it asked to close, finishes
/// the send stream.
async fn apply_network_actions(send: &mut quinn::SendStream, actions: app::NetworkActions) {
    for pdu in &actions.send {
        if codec::write_pdu(send, pdu).await.is_err() {
            break;
        }
    }
    if actions.close {
        let _ = send.finish();
    }
}
