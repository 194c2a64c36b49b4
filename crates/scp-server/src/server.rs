//! QUIC connection acceptor and per-connection session loop.
//!
//! `familycomd`'s `MessageServer` accepted raw `TcpStream`s and split each
//! into independent read/write halves. Here each accepted QUIC connection
//! still gets exactly one task, but the PDU stream is a single bidirectional
//! QUIC stream rather than the connection itself, and outbound PDUs can
//! arrive from two places: the connection's own dispatch calls, and another
//! session's task relaying through this session's outbox (see `app.rs`). The
//! task's main loop is a `tokio::select!` over those two sources.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use quinn::{Endpoint, RecvStream, SendStream};
use scp_core::codec::{self, CodecError, DecodeOutcome, Pdu};
use scp_core::registry::SessionId;
use scp_core::server_fsm::ServerEffect;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::{ServerApp, WriterCommand};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind QUIC endpoint: {0}")]
    Bind(#[source] std::io::Error),
}

/// QUIC listener bound to a UDP socket, dispatching each connection into its
/// own task against a shared [`ServerApp`].
pub struct MessageServer {
    endpoint: Endpoint,
    local_addr: SocketAddr,
}

impl MessageServer {
    /// Binds a new QUIC endpoint. Use port `0` to let the OS assign one;
    /// call `local_addr()` afterward to find out which port was chosen.
    pub fn bind(addr: SocketAddr, config: quinn::ServerConfig) -> Result<Self, ServerError> {
        let endpoint = Endpoint::server(config, addr).map_err(ServerError::Bind)?;
        let local_addr = endpoint.local_addr().map_err(ServerError::Bind)?;
        info!(addr = %local_addr, "QUIC message server listening");
        Ok(Self { endpoint, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Runs the accept loop, spawning a task per incoming connection. Runs
    /// until the endpoint is closed (or the process exits).
    pub async fn accept_loop(self, app: Arc<ServerApp>) {
        while let Some(incoming) = self.endpoint.accept().await {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(connection) => {
                        let peer = connection.remote_address();
                        debug!(peer = %peer, "accepted QUIC connection");
                        handle_connection(connection, app).await;
                        debug!(peer = %peer, "connection closed");
                    }
                    Err(e) => warn!(error = %e, "failed to establish QUIC connection"),
                }
            });
        }
    }
}

/// Drives one connection end to end: accepts its single bidirectional
/// stream, authenticates the first PDU as `CONNECT_REQ`, then loops
/// dispatching inbound PDUs and relayed outbound ones until the stream
/// closes or the session is told to close itself.
async fn handle_connection(connection: quinn::Connection, app: Arc<ServerApp>) {
    let id = SessionId::next();

    let (mut send, mut recv) = match connection.accept_bi().await {
        Ok(streams) => streams,
        Err(e) => {
            debug!(%id, error = %e, "peer never opened its stream");
            return;
        }
    };

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    app.register_outbox(id, outbox_tx);

    let mut buf = BytesMut::with_capacity(4096);
    let mut authenticated = false;

    loop {
        tokio::select! {
            biased;

            cmd = outbox_rx.recv() => {
                match cmd {
                    Some(WriterCommand::Send(pdu)) => {
                        if write(&mut send, &pdu).await.is_err() {
                            break;
                        }
                    }
                    Some(WriterCommand::Close) | None => break,
                }
            }

            outcome = read_one(&mut recv, &mut buf) => {
                match outcome {
                    Ok(Some(pdu)) => {
                        let effects = if !authenticated {
                            match pdu {
                                Pdu::ConnectReq { username } => {
                                    let effects = app.handle_connect_req(id, username);
                                    authenticated = app.is_registered(id);
                                    effects
                                }
                                _ => app.reject_unauthenticated(id),
                            }
                        } else {
                            app.dispatch(id, pdu)
                        };
                        if !apply_effects(&app, id, &mut send, effects).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(%id, "peer closed its stream");
                        break;
                    }
                    Err(e) => {
                        let effects = app.handle_codec_error(id, authenticated, &e);
                        let should_continue = apply_effects(&app, id, &mut send, effects).await;
                        if !authenticated || !should_continue {
                            break;
                        }
                    }
                }
            }
        }
    }

    app.drop_outbox(id);
    if authenticated {
        let effects = app.handle_transport_closed(id);
        apply_effects(&app, id, &mut send, effects).await;
    }
    let _ = send.finish();
}

/// Writes the effects a dispatch call addressed to `self_id`'s own stream
/// (effects for other sessions were already routed to their outboxes by
/// `ServerApp::route`, called inside `apply_effects` below). Returns `false`
/// once a `CloseSession(self_id)` is seen, telling the caller to stop.
async fn apply_effects(app: &ServerApp, self_id: SessionId, send: &mut SendStream, effects: Vec<ServerEffect>) -> bool {
    for effect in app.route(self_id, effects) {
        match effect {
            ServerEffect::SendTo(_, pdu) => {
                if write(send, &pdu).await.is_err() {
                    return false;
                }
            }
            ServerEffect::CloseSession(_) => return false,
        }
    }
    true
}

async fn write(send: &mut SendStream, pdu: &Pdu) -> std::io::Result<()> {
    codec::write_pdu(send, pdu).await
}

/// Reads from `recv` until either one full PDU is decoded, the stream ends
/// cleanly, or a codec error occurs. Already-buffered bytes are tried first,
/// so no I/O happens when a previous read delivered more than one frame.
async fn read_one(recv: &mut RecvStream, buf: &mut BytesMut) -> Result<Option<Pdu>, CodecError> {
    loop {
        match codec::decode_from(buf)? {
            DecodeOutcome::Complete { pdu, .. } => return Ok(Some(pdu)),
            DecodeOutcome::NeedMore => {}
        }

        let mut chunk = [0u8; 4096];
        match recv.read(&mut chunk).await {
            Ok(Some(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(None) => return Ok(None),
            Err(_) => return Ok(None),
        }
    }
}
