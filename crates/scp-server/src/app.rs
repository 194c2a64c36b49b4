//! Central server application: the shared session registry plus the
//! per-session outbound channels that let one connection's task hand a
//! relayed PDU to another.
//!
//! `familycomd`'s `DaemonApp` ran a single task multiplexing every event
//! source with `tokio::select!` over shared channels. SCP's dispatch instead
//! runs one task per connection (`server.rs`), because a single PDU can
//! touch two sessions at once (forwarding an invite, relaying text). What
//! those tasks share is `ServerApp`: the `Registry` behind a `Mutex` (one
//! critical section, same role as `DaemonApp`'s `db: Mutex<Database>`), and
//! an outbox per session so a dispatch call running on session A's task can
//! deliver a PDU to session B without touching B's `SendStream` directly.

use std::collections::HashMap;
use std::sync::Mutex;

use scp_core::codec::{CodecError, Pdu};
use scp_core::registry::{Registry, SessionId};
use scp_core::server_fsm::{self, ServerEffect};
use tokio::sync::mpsc;

/// A command handed to a connection task's writer side via its outbox.
#[derive(Debug, Clone)]
pub enum WriterCommand {
    Send(Pdu),
    Close,
}

/// Shared state every connection task dispatches against.
pub struct ServerApp {
    registry: Mutex<Registry>,
    outboxes: Mutex<HashMap<SessionId, mpsc::UnboundedSender<WriterCommand>>>,
}

impl ServerApp {
    pub fn new(max_clients: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::new(max_clients)),
            outboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a freshly-accepted connection's outbox, before its first
    /// read, so effects addressed to it route the same way whether they
    /// come from its own dispatch call or another session's.
    pub fn register_outbox(&self, id: SessionId, tx: mpsc::UnboundedSender<WriterCommand>) {
        self.outboxes.lock().unwrap().insert(id, tx);
    }

    pub fn drop_outbox(&self, id: SessionId) {
        self.outboxes.lock().unwrap().remove(&id);
    }

    /// Routes effects produced by dispatching on behalf of `self_id`. Effects
    /// addressed to `self_id` are handed back to the caller to write directly
    /// on its own stream; effects addressed elsewhere are pushed through the
    /// target's outbox.
    pub fn route(&self, self_id: SessionId, effects: Vec<ServerEffect>) -> Vec<ServerEffect> {
        let mut own = Vec::new();
        let outboxes = self.outboxes.lock().unwrap();
        for effect in effects {
            let target = match &effect {
                ServerEffect::SendTo(target, _) => *target,
                ServerEffect::CloseSession(target) => *target,
            };
            if target == self_id {
                own.push(effect);
                continue;
            }
            let Some(tx) = outboxes.get(&target) else { continue };
            let cmd = match effect {
                ServerEffect::SendTo(_, pdu) => WriterCommand::Send(pdu),
                ServerEffect::CloseSession(_) => WriterCommand::Close,
            };
            let _ = tx.send(cmd);
        }
        own
    }

    pub fn handle_connect_req(&self, id: SessionId, raw_username: String) -> Vec<ServerEffect> {
        let mut registry = self.registry.lock().unwrap();
        server_fsm::handle_connect_req(&mut registry, id, raw_username)
    }

    pub fn reject_unauthenticated(&self, id: SessionId) -> Vec<ServerEffect> {
        server_fsm::reject_unauthenticated(id)
    }

    pub fn handle_codec_error(&self, id: SessionId, authenticated: bool, err: &CodecError) -> Vec<ServerEffect> {
        server_fsm::handle_codec_error(id, authenticated, err)
    }

    pub fn dispatch(&self, id: SessionId, pdu: Pdu) -> Vec<ServerEffect> {
        let mut registry = self.registry.lock().unwrap();
        server_fsm::dispatch(&mut registry, id, pdu)
    }

    pub fn handle_transport_closed(&self, id: SessionId) -> Vec<ServerEffect> {
        let mut registry = self.registry.lock().unwrap();
        server_fsm::handle_transport_closed(&mut registry, id)
    }

    pub fn session_count(&self) -> usize {
        self.registry.lock().unwrap().size()
    }

    /// Whether `id` successfully completed `CONNECT_REQ`. Checked right after
    /// `handle_connect_req` to decide whether the connection is now
    /// authenticated, since a duplicate name or a full registry leaves it
    /// unregistered even though a `CONNECT_RESP` was sent.
    pub fn is_registered(&self, id: SessionId) -> bool {
        self.registry.lock().unwrap().get(id).is_some()
    }
}
