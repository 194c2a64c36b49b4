//! Client-side session state machine.
//!
//! This module is a pure function of `(state, event) -> (state, effects)`:
//! it never touches a socket or a terminal. The transport adapter in
//! `scp-client` feeds it PDUs and user commands and interprets the returned
//! [`ClientEffect`]s (send a PDU, show the user something, close the
//! connection). Keeping the FSM pure makes every row of the client's
//! transition table directly testable without a live QUIC connection.

use crate::codec::{chat_fwd_status, chat_init_status, connect_status, ChatFwdStatus, Pdu};
use crate::types::{TextPayload, Username};

/// The eight client-visible session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Idle,
    InitiatingChat,
    AwaitingPeerResponse,
    PendingPeerAccept,
    InChat,
    Disconnecting,
}

/// Transport-level events the client reacts to, outside of incoming PDUs.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    HandshakeCompleted,
    ConnectionTerminated,
}

/// A command typed by the interactive user.
#[derive(Debug, Clone)]
pub enum UserCommand {
    Chat { peer: String },
    Accept { peer: String },
    Reject { peer: String },
    EndChat,
    Disconnect,
    SendText { text: String },
}

/// Things for the transport adapter to do in response to a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEffect {
    SendPdu(Pdu),
    EmitUi(UiEvent),
    CloseConnection,
}

/// UI-facing notifications, decoupled from any particular rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Connected { username: String },
    ConnectFailed { status: u8 },
    ChatForwarded { target: String },
    ChatInitFailed { target: String, status: u8 },
    IncomingChatRequest { from: String },
    ChatStarted { target: String },
    Message { text: String },
    Notification { text: String },
    PeerLeft { peer: String },
    ServerError { code: u16, message: String },
    CommandRejected { reason: String },
}

/// The client session: current state plus the bookkeeping a client needs
/// (`current_target`, `pending_from`).
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub username: String,
    pub state: ClientState,
    pub current_target: Option<String>,
    pub pending_from: Option<String>,
}

impl ClientSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: ClientState::Connecting,
            current_target: None,
            pending_from: None,
        }
    }

    /// Handles a transport-level event.
    pub fn on_transport_event(&mut self, event: TransportEvent) -> Vec<ClientEffect> {
        match event {
            TransportEvent::HandshakeCompleted => {
                if self.state == ClientState::Connecting {
                    vec![ClientEffect::SendPdu(Pdu::ConnectReq {
                        username: self.username.clone(),
                    })]
                } else {
                    vec![]
                }
            }
            TransportEvent::ConnectionTerminated => {
                self.state = ClientState::Disconnected;
                self.current_target = None;
                self.pending_from = None;
                vec![ClientEffect::EmitUi(UiEvent::Notification {
                    text: "disconnected from server".to_string(),
                })]
            }
        }
    }

    /// Handles an inbound PDU.
    pub fn on_pdu(&mut self, pdu: Pdu) -> Vec<ClientEffect> {
        match pdu {
            Pdu::ConnectResp { status } => self.handle_connect_resp(status),
            Pdu::ChatInitResp { status } => self.handle_chat_init_resp(status),
            Pdu::ChatFwdReq { originator_username } => {
                self.handle_chat_fwd_req(originator_username)
            }
            Pdu::Text { text } => self.handle_text(text),
            Pdu::DisconnectNotif { peer_username } => self.handle_disconnect_notif(peer_username),
            Pdu::Error { error_code, message } => {
                // A tentative target (acceptor in IDLE, awaiting the
                // server's "started" sentinel) is stale once an ERROR
                // arrives, since the chat it anticipated didn't start.
                if self.state == ClientState::Idle {
                    self.current_target = None;
                }
                vec![ClientEffect::EmitUi(UiEvent::ServerError {
                    code: error_code,
                    message,
                })]
            }
            other => {
                tracing::warn!(?other, state = ?self.state, "unexpected PDU from server");
                vec![]
            }
        }
    }

    fn handle_connect_resp(&mut self, status: u8) -> Vec<ClientEffect> {
        if self.state != ClientState::Connecting {
            return vec![];
        }
        match connect_status(status) {
            Some(s) if matches!(s, crate::codec::ConnectStatus::Success) => {
                self.state = ClientState::Idle;
                vec![ClientEffect::EmitUi(UiEvent::Connected {
                    username: self.username.clone(),
                })]
            }
            _ => {
                self.state = ClientState::Disconnected;
                vec![
                    ClientEffect::EmitUi(UiEvent::ConnectFailed { status }),
                    ClientEffect::CloseConnection,
                ]
            }
        }
    }

    fn handle_chat_init_resp(&mut self, status: u8) -> Vec<ClientEffect> {
        if self.state != ClientState::InitiatingChat {
            return vec![];
        }
        match chat_init_status(status) {
            Some(crate::codec::ChatInitStatus::Forwarded) => {
                self.state = ClientState::AwaitingPeerResponse;
                vec![ClientEffect::EmitUi(UiEvent::ChatForwarded {
                    target: self.current_target.clone().unwrap_or_default(),
                })]
            }
            _ => {
                let target = self.current_target.take().unwrap_or_default();
                self.state = ClientState::Idle;
                vec![ClientEffect::EmitUi(UiEvent::ChatInitFailed { target, status })]
            }
        }
    }

    fn handle_chat_fwd_req(&mut self, originator_username: String) -> Vec<ClientEffect> {
        if self.state != ClientState::Idle {
            return vec![];
        }
        self.pending_from = Some(originator_username.clone());
        self.state = ClientState::PendingPeerAccept;
        vec![ClientEffect::EmitUi(UiEvent::IncomingChatRequest {
            from: originator_username,
        })]
    }

    /// Implements the `"Chat with <name> started."` sentinel match. There is
    /// no dedicated chat-started PDU in v1.0, so the acceptor and the
    /// originator both recognize this TEXT body by pattern instead.
    fn handle_text(&mut self, text: String) -> Vec<ClientEffect> {
        if self.state == ClientState::AwaitingPeerResponse {
            if let Some(target) = &self.current_target {
                if text.to_lowercase().contains("started") && text.contains(target.as_str()) {
                    self.state = ClientState::InChat;
                    let target = target.clone();
                    return vec![ClientEffect::EmitUi(UiEvent::ChatStarted { target })];
                }
            }
        }

        if self.state == ClientState::InChat {
            return vec![ClientEffect::EmitUi(UiEvent::Message { text })];
        }

        if self.state == ClientState::Idle && text.contains("Chat with") && text.contains("started")
        {
            if let Some(target) = extract_sentinel_target(&text) {
                self.current_target = Some(target.clone());
                self.state = ClientState::InChat;
                return vec![ClientEffect::EmitUi(UiEvent::ChatStarted { target })];
            }
        }

        vec![ClientEffect::EmitUi(UiEvent::Notification { text })]
    }

    fn handle_disconnect_notif(&mut self, peer_username: String) -> Vec<ClientEffect> {
        if self.state == ClientState::Idle && self.current_target.is_some() {
            // Tentative acceptor target, stale since the chat it anticipated
            // never started.
            self.current_target = None;
            return vec![ClientEffect::EmitUi(UiEvent::PeerLeft { peer: peer_username })];
        }
        if self.state != ClientState::InChat {
            return vec![];
        }
        self.state = ClientState::Idle;
        self.current_target = None;
        vec![ClientEffect::EmitUi(UiEvent::PeerLeft { peer: peer_username })]
    }

    /// Handles a command typed by the local user.
    pub fn on_user_command(&mut self, command: UserCommand) -> Vec<ClientEffect> {
        match command {
            UserCommand::Chat { peer } => self.user_initiate_chat(peer),
            UserCommand::Accept { peer } => self.user_respond_to_chat(true, peer),
            UserCommand::Reject { peer } => self.user_respond_to_chat(false, peer),
            UserCommand::EndChat => self.user_end_chat(),
            UserCommand::Disconnect => self.user_disconnect(),
            UserCommand::SendText { text } => self.user_send_text(text),
        }
    }

    fn user_initiate_chat(&mut self, peer: String) -> Vec<ClientEffect> {
        if self.state != ClientState::Idle {
            return vec![ClientEffect::EmitUi(UiEvent::CommandRejected {
                reason: "not idle".to_string(),
            })];
        }
        let peer = match Username::new(peer) {
            Ok(peer) => peer.as_str().to_string(),
            Err(e) => {
                return vec![ClientEffect::EmitUi(UiEvent::CommandRejected { reason: e.to_string() })];
            }
        };
        self.current_target = Some(peer.clone());
        self.state = ClientState::InitiatingChat;
        vec![ClientEffect::SendPdu(Pdu::ChatInitReq { peer_username: peer })]
    }

    fn user_respond_to_chat(&mut self, accept: bool, peer: String) -> Vec<ClientEffect> {
        if self.state != ClientState::PendingPeerAccept || self.pending_from.as_deref() != Some(peer.as_str())
        {
            return vec![ClientEffect::EmitUi(UiEvent::CommandRejected {
                reason: format!("no pending chat request from '{peer}'"),
            })];
        }
        self.pending_from = None;
        let status = if accept {
            ChatFwdStatus::Accepted
        } else {
            ChatFwdStatus::Rejected
        };
        let effect = ClientEffect::SendPdu(Pdu::chat_fwd_resp(status, peer.clone()));
        if accept {
            // Tentative: confirmed only once the server's "started" TEXT
            // arrives.
            self.current_target = Some(peer);
            self.state = ClientState::Idle;
        } else {
            self.state = ClientState::Idle;
        }
        vec![effect]
    }

    fn user_send_text(&mut self, text: String) -> Vec<ClientEffect> {
        if self.state != ClientState::InChat {
            return vec![ClientEffect::EmitUi(UiEvent::CommandRejected {
                reason: "not in a chat".to_string(),
            })];
        }
        let text = match TextPayload::new(text) {
            Ok(text) => text.into_string(),
            Err(e) => {
                return vec![ClientEffect::EmitUi(UiEvent::CommandRejected { reason: e.to_string() })];
            }
        };
        vec![ClientEffect::SendPdu(Pdu::Text { text })]
    }

    fn user_end_chat(&mut self) -> Vec<ClientEffect> {
        // No dedicated end-chat PDU in v1.0; behaves as /disconnect.
        self.user_disconnect()
    }

    fn user_disconnect(&mut self) -> Vec<ClientEffect> {
        if matches!(self.state, ClientState::Disconnected | ClientState::Disconnecting) {
            return vec![ClientEffect::EmitUi(UiEvent::CommandRejected {
                reason: "already disconnected or disconnecting".to_string(),
            })];
        }
        self.state = ClientState::Disconnecting;
        vec![ClientEffect::SendPdu(Pdu::DisconnectReq)]
    }
}

/// Extracts the name from `"Chat with {name} started."`, tolerating the
/// trailing period.
fn extract_sentinel_target(text: &str) -> Option<String> {
    let parts: Vec<&str> = text.split(' ').collect();
    let with_idx = parts.iter().position(|p| *p == "with")?;
    let raw = parts.get(with_idx + 1)?;
    Some(raw.trim_end_matches('.').to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChatFwdStatus as Fwd, ChatInitStatus, ConnectStatus};

    #[test]
    fn handshake_sends_connect_req() {
        let mut s = ClientSession::new("alice");
        let effects = s.on_transport_event(TransportEvent::HandshakeCompleted);
        assert_eq!(
            effects,
            vec![ClientEffect::SendPdu(Pdu::ConnectReq { username: "alice".into() })]
        );
    }

    #[test]
    fn connect_success_moves_to_idle() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::Connecting;
        let effects = s.on_pdu(Pdu::connect_resp(ConnectStatus::Success));
        assert_eq!(s.state, ClientState::Idle);
        assert!(matches!(effects[0], ClientEffect::EmitUi(UiEvent::Connected { .. })));
    }

    #[test]
    fn connect_failure_closes_connection() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::Connecting;
        let effects = s.on_pdu(Pdu::connect_resp(ConnectStatus::UserExists));
        assert_eq!(s.state, ClientState::Disconnected);
        assert!(effects.contains(&ClientEffect::CloseConnection));
    }

    #[test]
    fn chat_command_sends_init_req() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::Idle;
        let effects = s.on_user_command(UserCommand::Chat { peer: "bob".into() });
        assert_eq!(s.state, ClientState::InitiatingChat);
        assert_eq!(s.current_target.as_deref(), Some("bob"));
        assert_eq!(
            effects,
            vec![ClientEffect::SendPdu(Pdu::ChatInitReq { peer_username: "bob".into() })]
        );
    }

    #[test]
    fn chat_command_with_oversized_peer_name_is_rejected_without_sending() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::Idle;
        let effects = s.on_user_command(UserCommand::Chat { peer: "b".repeat(256) });
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target, None);
        assert!(matches!(effects[0], ClientEffect::EmitUi(UiEvent::CommandRejected { .. })));
    }

    #[test]
    fn chat_init_forwarded_moves_to_awaiting() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InitiatingChat;
        s.current_target = Some("bob".into());
        s.on_pdu(Pdu::chat_init_resp(ChatInitStatus::Forwarded));
        assert_eq!(s.state, ClientState::AwaitingPeerResponse);
    }

    #[test]
    fn chat_init_error_clears_target_and_returns_idle() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InitiatingChat;
        s.current_target = Some("bob".into());
        s.on_pdu(Pdu::chat_init_resp(ChatInitStatus::PeerBusy));
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target, None);
    }

    #[test]
    fn chat_fwd_req_while_idle_sets_pending() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::Idle;
        s.on_pdu(Pdu::ChatFwdReq { originator_username: "alice".into() });
        assert_eq!(s.state, ClientState::PendingPeerAccept);
        assert_eq!(s.pending_from.as_deref(), Some("alice"));
    }

    #[test]
    fn accept_sends_accepted_and_tentatively_sets_target() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::PendingPeerAccept;
        s.pending_from = Some("alice".into());
        let effects = s.on_user_command(UserCommand::Accept { peer: "alice".into() });
        assert_eq!(
            effects,
            vec![ClientEffect::SendPdu(Pdu::chat_fwd_resp(Fwd::Accepted, "alice"))]
        );
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target.as_deref(), Some("alice"));
        assert_eq!(s.pending_from, None);
    }

    #[test]
    fn reject_clears_pending_and_stays_idle() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::PendingPeerAccept;
        s.pending_from = Some("alice".into());
        s.on_user_command(UserCommand::Reject { peer: "alice".into() });
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.pending_from, None);
    }

    #[test]
    fn originator_enters_in_chat_on_started_sentinel() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::AwaitingPeerResponse;
        s.current_target = Some("bob".into());
        let effects = s.on_pdu(Pdu::Text { text: "Chat with bob started.".into() });
        assert_eq!(s.state, ClientState::InChat);
        assert_eq!(
            effects,
            vec![ClientEffect::EmitUi(UiEvent::ChatStarted { target: "bob".into() })]
        );
    }

    #[test]
    fn acceptor_enters_in_chat_on_started_sentinel() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::Idle;
        s.current_target = Some("alice".into());
        let effects = s.on_pdu(Pdu::Text { text: "Chat with alice started.".into() });
        assert_eq!(s.state, ClientState::InChat);
        assert_eq!(s.current_target.as_deref(), Some("alice"));
        assert_eq!(
            effects,
            vec![ClientEffect::EmitUi(UiEvent::ChatStarted { target: "alice".into() })]
        );
    }

    #[test]
    fn in_chat_text_is_displayed() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        let effects = s.on_pdu(Pdu::Text { text: "bob: hi".into() });
        assert_eq!(
            effects,
            vec![ClientEffect::EmitUi(UiEvent::Message { text: "bob: hi".into() })]
        );
    }

    #[test]
    fn send_text_requires_in_chat() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::Idle;
        let effects = s.on_user_command(UserCommand::SendText { text: "hi".into() });
        assert!(matches!(effects[0], ClientEffect::EmitUi(UiEvent::CommandRejected { .. })));
    }

    #[test]
    fn send_text_over_wire_limit_is_rejected_without_sending() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        let body = "a".repeat(TextPayload::MAX_LEN + 1);
        let effects = s.on_user_command(UserCommand::SendText { text: body });
        assert_eq!(s.state, ClientState::InChat);
        assert!(matches!(effects[0], ClientEffect::EmitUi(UiEvent::CommandRejected { .. })));
    }

    #[test]
    fn disconnect_notif_returns_to_idle_and_clears_target() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        s.current_target = Some("bob".into());
        let effects = s.on_pdu(Pdu::DisconnectNotif { peer_username: "bob".into() });
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target, None);
        assert_eq!(
            effects,
            vec![ClientEffect::EmitUi(UiEvent::PeerLeft { peer: "bob".into() })]
        );
    }

    #[test]
    fn endchat_behaves_as_disconnect() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        let effects = s.on_user_command(UserCommand::EndChat);
        assert_eq!(s.state, ClientState::Disconnecting);
        assert_eq!(effects, vec![ClientEffect::SendPdu(Pdu::DisconnectReq)]);
    }

    #[test]
    fn transport_terminated_resets_to_disconnected() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        s.current_target = Some("bob".into());
        s.on_transport_event(TransportEvent::ConnectionTerminated);
        assert_eq!(s.state, ClientState::Disconnected);
        assert_eq!(s.current_target, None);
    }

    #[test]
    fn error_pdu_is_reported_without_state_change() {
        let mut s = ClientSession::new("alice");
        s.state = ClientState::InChat;
        let effects = s.on_pdu(Pdu::error(crate::codec::ErrorCode::UnexpectedType, "oops"));
        assert_eq!(s.state, ClientState::InChat);
        assert!(matches!(effects[0], ClientEffect::EmitUi(UiEvent::ServerError { .. })));
    }

    #[test]
    fn error_clears_tentative_target_while_awaiting_start_sentinel() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::Idle;
        s.current_target = Some("alice".into());
        s.on_pdu(Pdu::error(crate::codec::ErrorCode::Internal, "oops"));
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target, None);
    }

    #[test]
    fn disconnect_notif_clears_tentative_target_while_awaiting_start_sentinel() {
        let mut s = ClientSession::new("bob");
        s.state = ClientState::Idle;
        s.current_target = Some("alice".into());
        let effects = s.on_pdu(Pdu::DisconnectNotif { peer_username: "alice".into() });
        assert_eq!(s.state, ClientState::Idle);
        assert_eq!(s.current_target, None);
        assert_eq!(
            effects,
            vec![ClientEffect::EmitUi(UiEvent::PeerLeft { peer: "alice".into() })]
        );
    }
}
