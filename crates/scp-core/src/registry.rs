//! The server-side session registry and chat-pairing table.
//!
//! Sessions are keyed by a process-local [`SessionId`], assigned at
//! transport accept time, well before a username is known. A session only
//! gains an entry in the name index once `CONNECT_REQ` succeeds, keeping
//! "has a socket" and "has claimed a name" as separate facts.
//!
//! Chat pairing is kept as a side table (`pairs`) rather than a `peer`
//! field pointing back into another session, so that no two sessions ever
//! hold owning references to each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Username;

/// A stable, process-local identifier for one connected peer's transport.
///
/// Assigned once at accept and never reused; unrelated to any value on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// Allocates a fresh, never-before-used id. Safe to call concurrently
    /// from multiple accept tasks without holding the registry's lock.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The per-connection state a registered session carries, shared across
/// every task that might need to read or mutate it (the server FSM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    AwaitingPeerForInit,
    AwaitingChatResponse,
    InChat,
}

/// A registered (post-`CONNECT_REQ`) session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub state: ServerState,
    /// The peer this session invited, awaiting their `CHAT_FWD_RESP`.
    pub pending_out: Option<SessionId>,
    /// The peer who invited this session, awaiting a local accept/reject.
    pub pending_in: Option<SessionId>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("username '{0}' is already registered")]
    NameTaken(String),
    #[error("registry is full")]
    Full,
}

/// The outcome of removing a session, for the caller to turn into outbound
/// effects (a `DISCONNECT_NOTIF`, typically).
#[derive(Debug)]
pub struct CleanupOutcome {
    pub removed: Session,
    /// The chat partner to notify, if `removed` was paired (`IN_CHAT`).
    pub notified_peer: Option<SessionId>,
}

/// Process-wide name→session map plus the chat-pairing side table.
///
/// All mutation happens behind a single lock held by the caller (see
/// `scp-server::app::ServerApp`) — this type does no internal locking of
/// its own, so every read sees a consistent view across the name index and
/// the pairing table.
#[derive(Debug)]
pub struct Registry {
    max_clients: usize,
    sessions: HashMap<SessionId, Session>,
    by_name: HashMap<String, SessionId>,
    pairs: HashMap<SessionId, SessionId>,
}

impl Registry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            sessions: HashMap::new(),
            by_name: HashMap::new(),
            pairs: HashMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_clients
    }

    /// Registers `id` under `username`. Fails if the name is taken or the
    /// registry is at capacity; the caller (server FSM) turns either error
    /// into the matching `CONNECT_RESP` status.
    pub fn register(&mut self, id: SessionId, username: &Username) -> Result<(), RegistryError> {
        if self.by_name.contains_key(username.as_str()) {
            return Err(RegistryError::NameTaken(username.as_str().to_string()));
        }
        if self.is_full() {
            return Err(RegistryError::Full);
        }
        self.by_name.insert(username.as_str().to_string(), id);
        self.sessions.insert(
            id,
            Session {
                id,
                username: username.as_str().to_string(),
                state: ServerState::Idle,
                pending_out: None,
                pending_in: None,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Session> {
        self.by_name.get(name).and_then(|id| self.sessions.get(id))
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// The session's current chat partner, if paired.
    pub fn peer_of(&self, id: SessionId) -> Option<SessionId> {
        self.pairs.get(&id).copied()
    }

    /// Atomically forms the chat pair `(a, b)`: both move to `IN_CHAT`,
    /// their pending fields clear, and `pairs` records the symmetric
    /// relation. Both ids must already be registered.
    pub fn form_pair(&mut self, a: SessionId, b: SessionId) {
        for (this, _other) in [(a, b), (b, a)] {
            if let Some(session) = self.sessions.get_mut(&this) {
                session.state = ServerState::InChat;
                session.pending_in = None;
                session.pending_out = None;
            }
        }
        self.pairs.insert(a, b);
        self.pairs.insert(b, a);
    }

    /// Removes `id` from the registry. If it was paired, the surviving
    /// partner is returned to `IDLE` and reported back as `notified_peer`
    /// for the caller to notify. Dangling `pending_out`/`pending_in`
    /// references a still-connected party holds toward `id` are cleared
    /// silently, so an in-flight invitation never strands its other side.
    ///
    /// Idempotent: removing an id that is not (or no longer) registered
    /// returns `None`.
    pub fn unregister(&mut self, id: SessionId) -> Option<CleanupOutcome> {
        let removed = self.sessions.remove(&id)?;
        self.by_name.remove(&removed.username);

        let notified_peer = if let Some(peer_id) = self.pairs.remove(&id) {
            self.pairs.remove(&peer_id);
            if let Some(peer) = self.sessions.get_mut(&peer_id) {
                peer.state = ServerState::Idle;
            }
            Some(peer_id)
        } else {
            None
        };

        if let Some(target_id) = removed.pending_out {
            if let Some(target) = self.sessions.get_mut(&target_id) {
                if target.pending_in == Some(id) {
                    target.pending_in = None;
                    target.state = ServerState::Idle;
                }
            }
        }
        if let Some(origin_id) = removed.pending_in {
            if let Some(origin) = self.sessions.get_mut(&origin_id) {
                if origin.pending_out == Some(id) {
                    origin.pending_out = None;
                    origin.state = ServerState::Idle;
                }
            }
        }

        Some(CleanupOutcome { removed, notified_peer })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::new(s).unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = Registry::new(10);
        let id = SessionId::next();
        reg.register(id, &name("alice")).unwrap();
        assert_eq!(reg.lookup("alice").unwrap().id, id);
        assert_eq!(reg.size(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = Registry::new(10);
        reg.register(SessionId::next(), &name("alice")).unwrap();
        let err = reg.register(SessionId::next(), &name("alice")).unwrap_err();
        assert_eq!(err, RegistryError::NameTaken("alice".to_string()));
    }

    #[test]
    fn full_registry_rejects_new_sessions() {
        let mut reg = Registry::new(1);
        reg.register(SessionId::next(), &name("alice")).unwrap();
        let err = reg.register(SessionId::next(), &name("bob")).unwrap_err();
        assert_eq!(err, RegistryError::Full);
    }

    #[test]
    fn form_pair_is_symmetric() {
        let mut reg = Registry::new(10);
        let a = SessionId::next();
        let b = SessionId::next();
        reg.register(a, &name("alice")).unwrap();
        reg.register(b, &name("bob")).unwrap();
        reg.form_pair(a, b);
        assert_eq!(reg.peer_of(a), Some(b));
        assert_eq!(reg.peer_of(b), Some(a));
        assert_eq!(reg.get(a).unwrap().state, ServerState::InChat);
        assert_eq!(reg.get(b).unwrap().state, ServerState::InChat);
    }

    #[test]
    fn unregister_restores_paired_peer_to_idle() {
        let mut reg = Registry::new(10);
        let a = SessionId::next();
        let b = SessionId::next();
        reg.register(a, &name("alice")).unwrap();
        reg.register(b, &name("bob")).unwrap();
        reg.form_pair(a, b);

        let outcome = reg.unregister(a).unwrap();
        assert_eq!(outcome.notified_peer, Some(b));
        assert_eq!(reg.get(b).unwrap().state, ServerState::Idle);
        assert_eq!(reg.peer_of(b), None);
        assert_eq!(reg.lookup("alice"), None);
        assert_eq!(reg.size(), 1);
    }

    #[test]
    fn unregister_clears_dangling_invitation_on_pending_peer() {
        let mut reg = Registry::new(10);
        let a = SessionId::next();
        let b = SessionId::next();
        reg.register(a, &name("alice")).unwrap();
        reg.register(b, &name("bob")).unwrap();
        reg.get_mut(a).unwrap().pending_out = Some(b);
        reg.get_mut(a).unwrap().state = ServerState::AwaitingPeerForInit;
        reg.get_mut(b).unwrap().pending_in = Some(a);
        reg.get_mut(b).unwrap().state = ServerState::AwaitingChatResponse;

        reg.unregister(a).unwrap();
        let bob = reg.get(b).unwrap();
        assert_eq!(bob.pending_in, None);
        assert_eq!(bob.state, ServerState::Idle);
    }

    #[test]
    fn unregister_unknown_session_is_a_no_op() {
        let mut reg = Registry::new(10);
        assert!(reg.unregister(SessionId::next()).is_none());
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }
}
