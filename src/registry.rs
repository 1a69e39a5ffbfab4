use crate::identity::Namespace;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

/// Handle held in the registry — used to deliver serialized messages to a
/// peer's connection task.
#[derive(Clone, Debug)]
pub struct PeerHandle {
    /// Channel sender feeding this peer's outbound WebSocket writer.
    pub tx: mpsc::Sender<String>,
    /// Instant this registration was created; acts as an eviction token so
    /// a stale entry is never removed out from under a newer one.
    pub registered_at: Instant,
}

/// Error returned by [`Registry::register`] when the peer id is already
/// taken within the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicatePeer;

type SessionKey = (Namespace, String);

/// Concurrent (namespace, session) → peer id → connection directory.
///
/// All mutation goes through [`register`](Self::register) and
/// [`unregister`](Self::unregister); the duplicate check and insert run
/// under a single shard lock so two connections can never race into the
/// same peer id.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: DashMap<SessionKey, HashMap<String, PeerHandle>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer, rejecting a duplicate id atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicatePeer`] if the (namespace, session, id) triple is
    /// already registered; the existing entry is left untouched.
    pub fn register(
        &self,
        ns: Namespace,
        session: &str,
        id: &str,
        handle: PeerHandle,
    ) -> Result<(), DuplicatePeer> {
        let mut entry = self.sessions.entry((ns, session.to_string())).or_default();
        if entry.contains_key(id) {
            return Err(DuplicatePeer);
        }
        entry.insert(id.to_string(), handle);
        Ok(())
    }

    /// Remove a peer if its registration token matches. Idempotent: a
    /// missing entry or a token mismatch is a no-op. Drops the session
    /// bucket once its last peer leaves.
    pub fn unregister(&self, ns: Namespace, session: &str, id: &str, registered_at: Instant) {
        let key = (ns, session.to_string());
        if let Some(mut entry) = self.sessions.get_mut(&key) {
            if entry
                .get(id)
                .is_some_and(|h| h.registered_at == registered_at)
            {
                entry.remove(id);
            }
        }
        self.sessions.remove_if(&key, |_k, peers| peers.is_empty());
    }

    /// Look up a peer's delivery handle.
    #[must_use]
    pub fn lookup(&self, ns: Namespace, session: &str, id: &str) -> Option<PeerHandle> {
        self.sessions
            .get(&(ns, session.to_string()))
            .and_then(|peers| peers.get(id).cloned())
    }

    /// Whether the triple is currently registered.
    #[must_use]
    pub fn contains(&self, ns: Namespace, session: &str, id: &str) -> bool {
        self.sessions
            .get(&(ns, session.to_string()))
            .is_some_and(|peers| peers.contains_key(id))
    }

    /// Snapshot of the peer ids currently in a session. Unknown sessions
    /// yield an empty list.
    #[must_use]
    pub fn list_peers(&self, ns: Namespace, session: &str) -> Vec<String> {
        self.sessions
            .get(&(ns, session.to_string()))
            .map(|peers| peers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of registered peers across all sessions.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }
}
