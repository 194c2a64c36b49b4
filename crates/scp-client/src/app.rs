//! TUI application state management.
//!
//! `ClientApp` wraps `scp_core::client_fsm::ClientSession` — the pure
//! protocol state machine — with the bits only a terminal UI needs: a
//! scrollback of human-readable lines, the input buffer, and a status
//! string. It follows an Elm-style Action/handle_action shape, holding a
//! single scrollback and chat target rather than a list of peers, because
//! SCP v1.0 allows at most one chat partner at a time.

use scp_core::client_fsm::{ClientEffect, ClientSession, UiEvent, UserCommand};
use scp_core::codec::Pdu;

/// Actions produced by the event handler and consumed by the app.
#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    InputChar(char),
    InputBackspace,
    InputDelete,
    InputLeft,
    InputRight,
    InputHome,
    InputEnd,
    Submit,
    ScrollUp,
    ScrollDown,
}

/// What the caller (the `tokio::select!` loop in `main.rs`) should do after
/// an action or network event has been applied: PDUs to write, and whether
/// the connection should now be closed.
#[derive(Debug, Default)]
pub struct NetworkActions {
    pub send: Vec<Pdu>,
    pub close: bool,
}

impl NetworkActions {
    fn from_effects(effects: Vec<ClientEffect>, app: &mut ClientApp) -> Self {
        let mut out = NetworkActions::default();
        for effect in effects {
            match effect {
                ClientEffect::SendPdu(pdu) => out.send.push(pdu),
                ClientEffect::CloseConnection => out.close = true,
                ClientEffect::EmitUi(event) => app.push_ui_event(event),
            }
        }
        out
    }
}

/// The client TUI's state: the protocol session plus everything needed to
/// render it.
pub struct ClientApp {
    pub session: ClientSession,
    /// Lines already rendered into the scrollback (oldest first).
    pub scrollback: Vec<String>,
    pub input: String,
    pub input_cursor: usize,
    pub scroll: u16,
    pub status: String,
    pub should_quit: bool,
}

impl ClientApp {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            session: ClientSession::new(username),
            scrollback: Vec::new(),
            input: String::new(),
            input_cursor: 0,
            scroll: 0,
            status: "connecting...".to_string(),
            should_quit: false,
        }
    }

    /// A short `(state) username@target >` prompt showing the session's
    /// current state and chat target at a glance.
    pub fn prompt(&self) -> String {
        let target = self
            .session
            .current_target
            .as_deref()
            .map(|t| format!("@{t}"))
            .unwrap_or_default();
        format!("({:?}) {}{target} > ", self.session.state, self.session.username)
    }

    /// Drives the FSM with a transport event and applies the resulting
    /// effects to this app's own state (scrollback/status), returning
    /// whatever the network layer still needs to do.
    pub fn on_transport_event(&mut self, event: scp_core::client_fsm::TransportEvent) -> NetworkActions {
        let effects = self.session.on_transport_event(event);
        NetworkActions::from_effects(effects, self)
    }

    /// Drives the FSM with an inbound PDU.
    pub fn on_pdu(&mut self, pdu: Pdu) -> NetworkActions {
        let effects = self.session.on_pdu(pdu);
        NetworkActions::from_effects(effects, self)
    }

    /// Handles one terminal-derived [`Action`].
    pub fn handle_action(&mut self, action: Action) -> NetworkActions {
        match action {
            Action::Quit => {
                self.should_quit = true;
                NetworkActions::default()
            }
            Action::InputChar(ch) => {
                self.input.insert(self.input_cursor, ch);
                self.input_cursor += ch.len_utf8();
                NetworkActions::default()
            }
            Action::InputBackspace => {
                if self.input_cursor > 0 {
                    let prev = self.input[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    self.input.drain(prev..self.input_cursor);
                    self.input_cursor = prev;
                }
                NetworkActions::default()
            }
            Action::InputDelete => {
                if self.input_cursor < self.input.len() {
                    let next_len = self.input[self.input_cursor..]
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(0);
                    self.input.drain(self.input_cursor..self.input_cursor + next_len);
                }
                NetworkActions::default()
            }
            Action::InputLeft => {
                if self.input_cursor > 0 {
                    self.input_cursor = self.input[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                }
                NetworkActions::default()
            }
            Action::InputRight => {
                if self.input_cursor < self.input.len() {
                    let next_len = self.input[self.input_cursor..]
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(0);
                    self.input_cursor += next_len;
                }
                NetworkActions::default()
            }
            Action::InputHome => {
                self.input_cursor = 0;
                NetworkActions::default()
            }
            Action::InputEnd => {
                self.input_cursor = self.input.len();
                NetworkActions::default()
            }
            Action::ScrollUp => {
                self.scroll = self.scroll.saturating_add(3);
                NetworkActions::default()
            }
            Action::ScrollDown => {
                self.scroll = self.scroll.saturating_sub(3);
                NetworkActions::default()
            }
            Action::Submit => self.submit_line(),
        }
    }

    /// Parses a submitted input line into the slash-command grammar and
    /// drives the FSM with the result. Unknown `/commands` and text typed
    /// outside `InChat` are reported locally, without reaching the FSM.
    fn submit_line(&mut self) -> NetworkActions {
        let line = self.input.trim().to_string();
        self.input.clear();
        self.input_cursor = 0;
        if line.is_empty() {
            return NetworkActions::default();
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.splitn(2, ' ');
            let command = parts.next().unwrap_or("");
            let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

            let user_command = match (command, arg) {
                ("chat", Some(peer)) => Some(UserCommand::Chat { peer: peer.to_string() }),
                ("accept", Some(peer)) => Some(UserCommand::Accept { peer: peer.to_string() }),
                ("reject", Some(peer)) => Some(UserCommand::Reject { peer: peer.to_string() }),
                ("endchat", None) => Some(UserCommand::EndChat),
                ("disconnect", None) => Some(UserCommand::Disconnect),
                _ => {
                    self.scrollback.push(format!("unknown command: /{command}"));
                    None
                }
            };

            return match user_command {
                Some(cmd) => {
                    let effects = self.session.on_user_command(cmd);
                    NetworkActions::from_effects(effects, self)
                }
                None => NetworkActions::default(),
            };
        }

        use scp_core::client_fsm::ClientState;
        match self.session.state {
            ClientState::InChat => {
                let effects = self.session.on_user_command(UserCommand::SendText { text: line });
                NetworkActions::from_effects(effects, self)
            }
            ClientState::PendingPeerAccept => {
                let from = self.session.pending_from.clone().unwrap_or_default();
                self.scrollback
                    .push(format!("pending chat request from '{from}' — use /accept or /reject"));
                NetworkActions::default()
            }
            _ => {
                self.scrollback.push("not in a chat — use /chat <username> to start one".to_string());
                NetworkActions::default()
            }
        }
    }

    /// Turns a protocol-level [`UiEvent`] into a scrollback line (and
    /// updates `status` for events that describe the session's overall
    /// standing rather than a single message).
    fn push_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Connected { username } => {
                self.status = format!("connected as {username}");
                self.scrollback.push(format!("connected as {username}."));
            }
            UiEvent::ConnectFailed { status } => {
                self.status = "connect failed".to_string();
                self.scrollback
                    .push(format!("connection rejected: {}", describe_connect_status(status)));
            }
            UiEvent::ChatForwarded { target } => {
                self.status = format!("waiting on {target}");
                self.scrollback.push(format!("invitation sent to {target}, waiting for a response..."));
            }
            UiEvent::ChatInitFailed { target, status } => {
                self.status = "idle".to_string();
                self.scrollback
                    .push(format!("could not chat with {target}: {}", describe_chat_init_status(status)));
            }
            UiEvent::IncomingChatRequest { from } => {
                self.status = format!("chat request from {from}");
                self.scrollback
                    .push(format!("{from} wants to chat — use /accept {from} or /reject {from}"));
            }
            UiEvent::ChatStarted { target } => {
                self.status = format!("chatting with {target}");
                self.scrollback.push(format!("chat with {target} started."));
            }
            UiEvent::Message { text } => {
                self.scrollback.push(text);
            }
            UiEvent::Notification { text } => {
                self.scrollback.push(text);
            }
            UiEvent::PeerLeft { peer } => {
                self.status = "idle".to_string();
                self.scrollback.push(format!("{peer} has left the chat."));
            }
            UiEvent::ServerError { code, message } => {
                self.scrollback.push(format!("server error {code:#06x}: {message}"));
            }
            UiEvent::CommandRejected { reason } => {
                self.scrollback.push(format!("command rejected: {reason}"));
            }
        }
        self.scroll = 0;
    }
}

fn describe_connect_status(status: u8) -> &'static str {
    match scp_core::codec::connect_status(status) {
        Some(scp_core::codec::ConnectStatus::Success) => "success",
        Some(scp_core::codec::ConnectStatus::UserExists) => "username already taken",
        Some(scp_core::codec::ConnectStatus::AuthFailed) => "authentication failed",
        Some(scp_core::codec::ConnectStatus::ServerFull) => "server is full",
        Some(scp_core::codec::ConnectStatus::VersionMismatch) => "protocol version mismatch",
        None => "unknown status",
    }
}

fn describe_chat_init_status(status: u8) -> &'static str {
    match scp_core::codec::chat_init_status(status) {
        Some(scp_core::codec::ChatInitStatus::Forwarded) => "forwarded",
        Some(scp_core::codec::ChatInitStatus::PeerNotFound) => "no such user",
        Some(scp_core::codec::ChatInitStatus::PeerBusy) => "user is busy",
        Some(scp_core::codec::ChatInitStatus::SelfChat) => "cannot chat with yourself",
        Some(scp_core::codec::ChatInitStatus::PeerRejected) => "invitation rejected",
        None => "unknown status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_core::client_fsm::ClientState;

    #[test]
    fn chat_command_sends_pdu_and_updates_scrollback() {
        let mut app = ClientApp::new("alice");
        app.session.state = ClientState::Idle;
        app.input = "/chat bob".to_string();
        let net = app.handle_action(Action::Submit);
        assert_eq!(net.send, vec![Pdu::ChatInitReq { peer_username: "bob".into() }]);
        assert_eq!(app.session.state, ClientState::InitiatingChat);
    }

    #[test]
    fn plain_text_outside_chat_is_reported_locally_not_sent() {
        let mut app = ClientApp::new("alice");
        app.session.state = ClientState::Idle;
        app.input = "hello".to_string();
        let net = app.handle_action(Action::Submit);
        assert!(net.send.is_empty());
        assert!(app.scrollback.iter().any(|l| l.contains("not in a chat")));
    }

    #[test]
    fn plain_text_in_chat_sends_text_pdu() {
        let mut app = ClientApp::new("alice");
        app.session.state = ClientState::InChat;
        app.input = "hi bob".to_string();
        let net = app.handle_action(Action::Submit);
        assert_eq!(net.send, vec![Pdu::Text { text: "hi bob".into() }]);
    }

    #[test]
    fn unknown_command_is_reported_locally() {
        let mut app = ClientApp::new("alice");
        app.input = "/nope".to_string();
        let net = app.handle_action(Action::Submit);
        assert!(net.send.is_empty());
        assert!(app.scrollback.iter().any(|l| l.contains("unknown command")));
    }

    #[test]
    fn connect_resp_success_pushes_scrollback_and_sets_status() {
        let mut app = ClientApp::new("alice");
        app.session.state = ClientState::Connecting;
        let net = app.on_pdu(Pdu::connect_resp(scp_core::codec::ConnectStatus::Success));
        assert!(net.send.is_empty());
        assert!(!net.close);
        assert!(app.scrollback.iter().any(|l| l.contains("connected as alice")));
    }

    #[test]
    fn input_editing_tracks_cursor() {
        let mut app = ClientApp::new("alice");
        app.handle_action(Action::InputChar('h'));
        app.handle_action(Action::InputChar('i'));
        assert_eq!(app.input, "hi");
        assert_eq!(app.input_cursor, 2);
        app.handle_action(Action::InputBackspace);
        assert_eq!(app.input, "h");
        assert_eq!(app.input_cursor, 1);
    }
}
