//! Client registry
//!
//! Two maps kept in step under one lock:
//! - `ConnectionId -> Client` (membership)
//! - `nickname -> ConnectionId` (nickname uniqueness)
//!
//! The lock is a `std::sync::Mutex` and is never held across an `.await`;
//! callers that need to do I/O take a snapshot and release it first.
//! Session ids come from an atomic counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::{ChatConfig, ReservedNames};
use crate::error::AppError;
use crate::message::Message;
use crate::types::{ConnectionId, SessionId};

#[derive(Debug, Default)]
struct RegistryInner {
    clients: HashMap<ConnectionId, Client>,
    nicknames: HashMap<String, ConnectionId>,
}

/// Shared registry of admitted sessions
///
/// Constructed once per server and shared behind an `Arc`.
#[derive(Debug)]
pub struct ClientRegistry {
    inner: Mutex<RegistryInner>,
    next_id: AtomicU64,
    reserved: ReservedNames,
    min_nick_len: usize,
}

impl ClientRegistry {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            next_id: AtomicU64::new(0),
            reserved: config.reserved_names.clone(),
            min_nick_len: config.min_nick_len,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // No code path panics between the paired map updates.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a connection, granting it the next session id
    ///
    /// The nickname defaults to the rendered session id.
    ///
    /// # Errors
    /// [`AppError::Registry`] if the connection is already admitted.
    pub fn admit(
        &self,
        conn: ConnectionId,
        sender: mpsc::Sender<Message>,
    ) -> Result<SessionId, AppError> {
        let mut inner = self.lock();
        if inner.clients.contains_key(&conn) {
            return Err(AppError::Registry("session already admitted"));
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let client = Client::new(conn, id, sender);
        if inner.nicknames.contains_key(&client.nickname) {
            return Err(AppError::Registry("default nickname already taken"));
        }

        inner.nicknames.insert(client.nickname.clone(), conn);
        inner.clients.insert(conn, client);

        info!("Session {} admitted as {}", conn, id);
        debug!("Total clients: {}", inner.clients.len());
        Ok(id)
    }

    /// Remove a connection from both maps
    ///
    /// No-op (returns `None`) if the connection is not admitted, so it can be
    /// called from both the Leave path and the disconnect path.
    pub fn remove(&self, conn: ConnectionId) -> Option<Client> {
        let mut inner = self.lock();
        let client = inner.clients.remove(&conn)?;
        if inner.nicknames.get(&client.nickname) == Some(&conn) {
            inner.nicknames.remove(&client.nickname);
        }

        info!("Session {} ({}) removed", client.session_id, client.nickname);
        debug!("Total clients: {}", inner.clients.len());
        Some(client)
    }

    fn check_nick(&self, inner: &RegistryInner, nick: &str) -> Result<(), AppError> {
        if nick.chars().count() < self.min_nick_len {
            return Err(AppError::NameTooShort);
        }
        if self.reserved.contains(nick) {
            return Err(AppError::NameReserved);
        }
        if inner.nicknames.contains_key(nick) {
            return Err(AppError::NameConflict);
        }
        Ok(())
    }

    /// Check whether `nick` could be assigned right now
    pub fn validate_nick(&self, nick: &str) -> Result<(), AppError> {
        let inner = self.lock();
        self.check_nick(&inner, nick)
    }

    /// Change a session's nickname
    ///
    /// Validation and the delete+insert happen under one lock hold, so no
    /// observer sees both names or neither. Returns `(old, new)`.
    pub fn rename_nick(
        &self,
        conn: ConnectionId,
        new_nick: &str,
    ) -> Result<(String, String), AppError> {
        let mut inner = self.lock();
        if !inner.clients.contains_key(&conn) {
            return Err(AppError::Registry("session not admitted"));
        }
        self.check_nick(&inner, new_nick)?;

        let Some(client) = inner.clients.get_mut(&conn) else {
            return Err(AppError::Registry("session not admitted"));
        };
        let old_nick = std::mem::replace(&mut client.nickname, new_nick.to_string());
        inner.nicknames.remove(&old_nick);
        inner.nicknames.insert(new_nick.to_string(), conn);

        info!("Nickname changed: {} -> {}", old_nick, new_nick);
        Ok((old_nick, new_nick.to_string()))
    }

    /// Point-in-time copy of the members, ordered by session id
    ///
    /// `excluding` drops one connection (typically the sender).
    pub fn snapshot_members(&self, excluding: Option<ConnectionId>) -> Vec<Client> {
        let inner = self.lock();
        let mut members: Vec<Client> = inner
            .clients
            .values()
            .filter(|c| Some(c.conn) != excluding)
            .cloned()
            .collect();
        drop(inner);

        members.sort_by_key(|c| c.session_id);
        members
    }

    /// Look up the member currently holding `nick`
    pub fn find_by_nick(&self, nick: &str) -> Option<Client> {
        let inner = self.lock();
        let conn = inner.nicknames.get(nick)?;
        inner.clients.get(conn).cloned()
    }

    /// Current nickname of a connection, if admitted
    pub fn nickname_of(&self, conn: ConnectionId) -> Option<String> {
        self.lock().clients.get(&conn).map(|c| c.nickname.clone())
    }

    /// All nicknames, ordered by session id
    pub fn nicknames(&self) -> Vec<String> {
        self.snapshot_members(None)
            .into_iter()
            .map(|c| c.nickname)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the two maps form a bijection over admitted sessions
    pub fn is_consistent(&self) -> bool {
        let inner = self.lock();
        inner.clients.len() == inner.nicknames.len()
            && inner.nicknames.iter().all(|(nick, conn)| {
                inner
                    .clients
                    .get(conn)
                    .is_some_and(|c| &c.nickname == nick && c.conn == *conn)
            })
    }
}
