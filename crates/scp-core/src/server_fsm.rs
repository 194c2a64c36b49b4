//! Server-side per-session dispatch.
//!
//! Unlike `client_fsm`, the server's transitions often touch two sessions
//! at once (forwarding an invitation, relaying text, tearing down a pair),
//! so these functions take `&mut Registry` directly rather than wrapping a
//! single session struct. Each function is still a pure
//! `(registry, event) -> Vec<ServerEffect>` mapping: no socket I/O, no
//! locking (the caller holds the registry's mutex for the duration of one
//! dispatch call). This makes the whole transition table testable by
//! constructing a `Registry` and asserting on the returned effects.

use crate::codec::{
    chat_fwd_status, ChatFwdStatus, CodecError, ErrorCode, Pdu,
};
use crate::registry::{Registry, ServerState, SessionId};
use crate::types::{TextPayload, Username};

/// Something for the transport adapter to do: write a PDU to a session's
/// stream, or tear the connection down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEffect {
    SendTo(SessionId, Pdu),
    CloseSession(SessionId),
}

/// Handles `CONNECT_REQ`, the only PDU valid before a session is
/// registered. Internally checks name-uniqueness and capacity via
/// [`Registry::register`]; the resulting status is reported on the caller's
/// own stream, and the session is closed unless registration succeeded.
pub fn handle_connect_req(registry: &mut Registry, id: SessionId, raw_username: String) -> Vec<ServerEffect> {
    let username = match Username::new(raw_username) {
        Ok(u) => u,
        Err(_) => {
            return vec![
                ServerEffect::SendTo(id, Pdu::error(ErrorCode::Malformed, "invalid username")),
                ServerEffect::CloseSession(id),
            ]
        }
    };

    match registry.register(id, &username) {
        Ok(()) => vec![ServerEffect::SendTo(id, Pdu::connect_resp(crate::codec::ConnectStatus::Success))],
        Err(crate::registry::RegistryError::NameTaken(_)) => vec![
            ServerEffect::SendTo(id, Pdu::connect_resp(crate::codec::ConnectStatus::UserExists)),
            ServerEffect::CloseSession(id),
        ],
        Err(crate::registry::RegistryError::Full) => vec![
            ServerEffect::SendTo(id, Pdu::connect_resp(crate::codec::ConnectStatus::ServerFull)),
            ServerEffect::CloseSession(id),
        ],
    }
}

/// Any PDU other than `CONNECT_REQ` arriving before registration closes the
/// connection immediately — there is no session to report an error on in a
/// way that would mean anything to the client.
pub fn reject_unauthenticated(id: SessionId) -> Vec<ServerEffect> {
    vec![ServerEffect::CloseSession(id)]
}

/// Turns a codec failure into the wire-level response it implies. Closes
/// the connection only if it never got past authentication — a malformed
/// frame from an already-registered peer is reported but tolerated.
pub fn handle_codec_error(id: SessionId, authenticated: bool, err: &CodecError) -> Vec<ServerEffect> {
    let code = match err {
        CodecError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
        CodecError::InvalidLength => ErrorCode::InvalidLength,
        CodecError::UnknownMessageType(_) | CodecError::InvalidUtf8 | CodecError::Malformed => {
            ErrorCode::Malformed
        }
    };
    let mut effects = vec![ServerEffect::SendTo(id, Pdu::error(code, err.to_string()))];
    if !authenticated {
        effects.push(ServerEffect::CloseSession(id));
    }
    effects
}

/// Dispatches a PDU from an already-registered session according to its
/// current server-side state. Off-table combinations yield
/// `ERROR(UNEXPECTED_TYPE)` and leave state untouched.
pub fn dispatch(registry: &mut Registry, id: SessionId, pdu: Pdu) -> Vec<ServerEffect> {
    if registry.get(id).is_none() {
        // The session was already cleaned up (e.g. a racing disconnect);
        // nothing to do.
        return vec![];
    }

    match pdu {
        Pdu::DisconnectReq => handle_disconnect_req(registry, id),
        Pdu::ChatInitReq { peer_username } => handle_chat_init_req(registry, id, peer_username),
        Pdu::ChatFwdResp { status, originator_username } => {
            handle_chat_fwd_resp(registry, id, status, originator_username)
        }
        Pdu::Text { text } => handle_text(registry, id, text),
        other => {
            tracing::warn!(?other, %id, "unexpected PDU for registered session");
            vec![ServerEffect::SendTo(
                id,
                Pdu::error(ErrorCode::UnexpectedType, "unexpected message type for current state"),
            )]
        }
    }
}

fn unexpected(id: SessionId) -> Vec<ServerEffect> {
    vec![ServerEffect::SendTo(
        id,
        Pdu::error(ErrorCode::UnexpectedType, "unexpected message type for current state"),
    )]
}

fn handle_chat_init_req(registry: &mut Registry, id: SessionId, peer_username: String) -> Vec<ServerEffect> {
    let Some(session) = registry.get(id) else { return vec![] };
    if session.state != ServerState::Idle {
        return unexpected(id);
    }
    let self_name = session.username.clone();

    if peer_username == self_name {
        return vec![ServerEffect::SendTo(
            id,
            Pdu::chat_init_resp(crate::codec::ChatInitStatus::SelfChat),
        )];
    }

    let Some(peer) = registry.lookup(&peer_username) else {
        return vec![ServerEffect::SendTo(
            id,
            Pdu::chat_init_resp(crate::codec::ChatInitStatus::PeerNotFound),
        )];
    };
    let peer_id = peer.id;
    if peer.state != ServerState::Idle {
        return vec![ServerEffect::SendTo(
            id,
            Pdu::chat_init_resp(crate::codec::ChatInitStatus::PeerBusy),
        )];
    }

    registry.get_mut(id).unwrap().pending_out = Some(peer_id);
    registry.get_mut(id).unwrap().state = ServerState::AwaitingPeerForInit;
    registry.get_mut(peer_id).unwrap().pending_in = Some(id);
    registry.get_mut(peer_id).unwrap().state = ServerState::AwaitingChatResponse;

    vec![
        ServerEffect::SendTo(id, Pdu::chat_init_resp(crate::codec::ChatInitStatus::Forwarded)),
        ServerEffect::SendTo(peer_id, Pdu::ChatFwdReq { originator_username: self_name }),
    ]
}

fn handle_chat_fwd_resp(
    registry: &mut Registry,
    id: SessionId,
    status: u8,
    originator_username: String,
) -> Vec<ServerEffect> {
    let Some(session) = registry.get(id) else { return vec![] };
    if session.state != ServerState::AwaitingChatResponse {
        return unexpected(id);
    }

    let Some(origin) = registry.lookup(&originator_username) else {
        return vec![ServerEffect::SendTo(id, Pdu::error(ErrorCode::Internal, "originator no longer connected"))];
    };
    let origin_id = origin.id;
    if session.pending_in != Some(origin_id) {
        return unexpected(id);
    }

    match chat_fwd_status(status) {
        Some(ChatFwdStatus::Accepted) => {
            let acceptor_name = session.username.clone();
            registry.form_pair(id, origin_id);
            vec![
                ServerEffect::SendTo(
                    origin_id,
                    Pdu::Text { text: format!("Chat with {acceptor_name} started.") },
                ),
                ServerEffect::SendTo(
                    id,
                    Pdu::Text { text: format!("Chat with {originator_username} started.") },
                ),
            ]
        }
        Some(ChatFwdStatus::Rejected) => {
            if let Some(s) = registry.get_mut(id) {
                s.pending_in = None;
                s.state = ServerState::Idle;
            }
            if let Some(o) = registry.get_mut(origin_id) {
                o.pending_out = None;
                o.state = ServerState::Idle;
            }
            vec![ServerEffect::SendTo(
                origin_id,
                Pdu::chat_init_resp(crate::codec::ChatInitStatus::PeerRejected),
            )]
        }
        None => vec![ServerEffect::SendTo(id, Pdu::error(ErrorCode::Malformed, "unknown chat_fwd status"))],
    }
}

fn handle_text(registry: &mut Registry, id: SessionId, text: String) -> Vec<ServerEffect> {
    let Some(session) = registry.get(id) else { return vec![] };
    if session.state != ServerState::InChat {
        return unexpected(id);
    }
    let self_name = session.username.clone();

    let Some(peer_id) = registry.peer_of(id) else {
        return vec![ServerEffect::SendTo(id, Pdu::error(ErrorCode::Internal, "no chat partner on record"))];
    };
    match registry.get(peer_id) {
        Some(peer) if peer.state == ServerState::InChat => {
            // The sender's own name plus the ": " separator can push an
            // already near-max-length TEXT body past the wire's u16 limit;
            // report that back to the sender rather than relaying a frame
            // that would fail to encode.
            match TextPayload::new(format!("{self_name}: {text}")) {
                Ok(relayed) => vec![ServerEffect::SendTo(peer_id, Pdu::Text { text: relayed.into_string() })],
                Err(_) => vec![ServerEffect::SendTo(
                    id,
                    Pdu::error(ErrorCode::InvalidLength, "message too long to relay"),
                )],
            }
        }
        _ => vec![ServerEffect::SendTo(id, Pdu::error(ErrorCode::Internal, "chat partner not available"))],
    }
}

fn handle_disconnect_req(registry: &mut Registry, id: SessionId) -> Vec<ServerEffect> {
    match registry.unregister(id) {
        Some(outcome) => {
            let mut effects = Vec::new();
            if let Some(peer_id) = outcome.notified_peer {
                effects.push(ServerEffect::SendTo(
                    peer_id,
                    Pdu::DisconnectNotif { peer_username: outcome.removed.username },
                ));
            }
            effects.push(ServerEffect::CloseSession(id));
            effects
        }
        None => vec![ServerEffect::CloseSession(id)],
    }
}

/// Cleanup triggered by the transport terminating without a prior
/// `DISCONNECT_REQ` (idle timeout, network failure, client crash). Same
/// registry-side effects as an explicit disconnect, minus closing a
/// connection that is already gone.
pub fn handle_transport_closed(registry: &mut Registry, id: SessionId) -> Vec<ServerEffect> {
    match registry.unregister(id) {
        Some(outcome) => match outcome.notified_peer {
            Some(peer_id) => vec![ServerEffect::SendTo(
                peer_id,
                Pdu::DisconnectNotif { peer_username: outcome.removed.username },
            )],
            None => vec![],
        },
        None => vec![],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
