//! Per-connection session state machine
//!
//! ```text
//!            Join(valid)             Leave / read failure
//! Unjoined ─────────────→ Joined ─────────────────────────→ Left
//!    │                                                       ▲
//!    └──────────────── read failure ─────────────────────────┘
//! ```
//!
//! A `Session` is owned by its connection handler. The registry only keeps
//! a [`Client`](crate::client::Client) record pointing at the same outbound
//! channel.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{AppError, SendError};
use crate::message::{Message, MessageType};
use crate::registry::ClientRegistry;
use crate::types::{ConnectionId, SessionId};

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, not yet admitted
    Unjoined,
    /// Admitted with the given session id
    Joined(SessionId),
    /// Terminal
    Left,
}

/// Server-side state of one connection
#[derive(Debug)]
pub struct Session {
    /// Opaque transport handle
    pub conn: ConnectionId,
    /// Current lifecycle state
    pub state: SessionState,
    /// Server → client message channel
    sender: mpsc::Sender<Message>,
    /// Session id granted on admission, kept after leaving
    joined_as: Option<SessionId>,
}

impl Session {
    /// Create a session in the `Unjoined` state
    pub fn new(conn: ConnectionId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            conn,
            state: SessionState::Unjoined,
            sender,
            joined_as: None,
        }
    }

    /// Clone of the outbound channel, handed to the registry on admission
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.sender.clone()
    }

    /// Send a message to this session's own client
    pub async fn send(&self, msg: Message) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Resolves once the writer task has dropped its end of the channel
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self.state {
            SessionState::Joined(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined(_))
    }

    /// Identity used to address replies: the session id once joined,
    /// otherwise empty
    pub fn reply_to(&self) -> String {
        self.session_id().map(|id| id.to_string()).unwrap_or_default()
    }

    /// Name shown to the client in error text: the session id it was
    /// granted, falling back to the connection handle
    pub fn label(&self) -> String {
        self.joined_as
            .map(|id| id.to_string())
            .unwrap_or_else(|| self.conn.to_string())
    }

    /// State gate: decides whether `kind` may be processed at all
    ///
    /// Runs after syntax validation and before semantic validation.
    pub fn gate(&self, kind: MessageType) -> Result<(), AppError> {
        match (self.state, kind) {
            (SessionState::Unjoined, MessageType::Join) => Ok(()),
            (SessionState::Unjoined, _) => Err(AppError::MustJoinFirst),
            (SessionState::Joined(_), MessageType::Join) => Err(AppError::AlreadyJoined),
            (SessionState::Joined(_), _) => Ok(()),
            (SessionState::Left, _) => Err(AppError::NotJoined(self.label())),
        }
    }

    /// `Unjoined → Joined`
    pub fn mark_joined(&mut self, id: SessionId) -> Result<(), AppError> {
        match self.state {
            SessionState::Unjoined => {
                self.state = SessionState::Joined(id);
                self.joined_as = Some(id);
                Ok(())
            }
            SessionState::Joined(_) => Err(AppError::AlreadyJoined),
            SessionState::Left => Err(AppError::NotJoined(self.label())),
        }
    }

    /// Forced or explicit transition to `Left`
    ///
    /// Removes the registry entry if there is one. Safe to call from both the
    /// Leave path and the read-failure path; only the first call mutates.
    /// Returns true if this call performed the transition.
    pub fn teardown(&mut self, registry: &ClientRegistry) -> bool {
        if self.state == SessionState::Left {
            return false;
        }
        let removed = registry.remove(self.conn);
        debug!(
            "Session {} torn down (registry entry removed: {})",
            self.conn,
            removed.is_some()
        );
        self.state = SessionState::Left;
        true
    }
}
