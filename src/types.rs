//! Basic type definitions for the chat hub
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based opaque handle for an accepted transport
//! - `SessionId`: sequential id granted on admission, rendered as `client-<n>`

use uuid::Uuid;

/// Prefix of every rendered session id
pub const SESSION_ID_PREFIX: &str = "client-";

/// Opaque transport handle (newtype pattern)
///
/// Assigned when a connection is accepted, before the session joins.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session id granted on a successful join
///
/// Monotonic per process; the first admitted session is `client-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Returns true if `name` has the shape of a rendered session id
    pub fn is_session_id_shaped(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        lower
            .strip_prefix(SESSION_ID_PREFIX)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", SESSION_ID_PREFIX, self.0)
    }
}
