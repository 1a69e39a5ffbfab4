use crate::identity::Namespace;
use crate::registry::Registry;
use thiserror::Error;

/// Maximum length of a session name in bytes.
pub const MAX_SESSION_LEN: usize = 64;

/// Why a connection was refused at establishment. All variants close the
/// connection with no registry mutation; the reason is only logged, never
/// sent to the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The request path did not split into exactly namespace/session/id.
    #[error("path must contain exactly 3 segments: namespace/session/peer id")]
    MalformedPath,
    /// The session name failed the length or character-set rule.
    #[error("invalid session name")]
    InvalidSession,
    /// The namespace segment names no known platform.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    /// The peer id failed its namespace's grammar.
    #[error("invalid peer id for namespace {0}")]
    InvalidIdentity(Namespace),
    /// The (namespace, session, id) triple is already connected.
    #[error("peer id already connected in this session")]
    DuplicatePeer,
}

/// A validated connection path: where the peer wants to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPath {
    /// Platform namespace governing the peer-id grammar.
    pub namespace: Namespace,
    /// Session the peer joins.
    pub session: String,
    /// The peer's own id within the session.
    pub peer_id: String,
}

/// True iff the session name is 1..=64 bytes drawn from `[A-Za-z0-9_-]`.
#[must_use]
pub fn is_session_valid(session: &str) -> bool {
    !session.is_empty()
        && session.len() <= MAX_SESSION_LEN
        && session
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Decide whether a connection with the given request path may register.
///
/// The duplicate check against the registry is advisory: the authoritative
/// check-then-insert runs atomically inside [`Registry::register`], which a
/// loser of the race sees as [`RejectReason::DuplicatePeer`] as well.
///
/// # Errors
///
/// Returns the first failing check, in path → session → namespace → id →
/// duplicate order.
pub fn authorize(path: &str, registry: &Registry) -> Result<PeerPath, RejectReason> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let mut segments = trimmed.split('/');
    let (Some(ns), Some(session), Some(peer_id), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(RejectReason::MalformedPath);
    };

    if !is_session_valid(session) {
        return Err(RejectReason::InvalidSession);
    }

    let namespace: Namespace = ns
        .parse()
        .map_err(|e: crate::identity::UnknownNamespace| RejectReason::UnknownNamespace(e.0))?;

    if !namespace.is_identity_valid(peer_id) {
        return Err(RejectReason::InvalidIdentity(namespace));
    }

    if registry.contains(namespace, session, peer_id) {
        return Err(RejectReason::DuplicatePeer);
    }

    Ok(PeerPath {
        namespace,
        session: session.to_string(),
        peer_id: peer_id.to_string(),
    })
}
