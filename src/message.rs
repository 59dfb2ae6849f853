//! Message protocol definitions
//!
//! One JSON envelope per line. The six message kinds form a closed enum so
//! routing is an exhaustive match rather than a string switch.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Protocol version spoken by this server
pub const PROTOCOL_VERSION: &str = "1.0";

/// Identity used in `from` for server-authored messages
pub const SERVER_IDENTITY: &str = "server";

/// Identity used in `to` for room-wide messages
pub const ALL_IDENTITY: &str = "all";

/// Body of the acknowledgement sent after a room-wide chat
pub const CHAT_ACK_BODY: &str = "Message sent to all...";

/// Body of the acknowledgement sent for an unrecognized command
pub const UNKNOWN_COMMAND_BODY: &str = "unknown command";

/// Message kind carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Admission request (client → server)
    Join,
    /// Admission acknowledgement carrying the session id (server → client)
    JoinAck,
    /// Chat text, commands and direct messages
    Chat,
    /// Delivery acknowledgement or command reply (server → client)
    ChatAck,
    /// Explicit departure
    Leave,
    /// Failure report (server → client)
    Error,
}

impl MessageType {
    /// Wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Join => "join",
            MessageType::JoinAck => "join_ack",
            MessageType::Chat => "chat",
            MessageType::ChatAck => "chat_ack",
            MessageType::Leave => "leave",
            MessageType::Error => "error",
        }
    }

    /// Returns true for types only the server may emit
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            MessageType::JoinAck | MessageType::ChatAck | MessageType::Error
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire envelope
///
/// Treated as a value: fan-out clones it per recipient, so no recipient
/// ever observes a later rewrite of `from` or `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub body: String,
}

impl Message {
    /// Create a message with the current protocol version
    pub fn new(
        kind: MessageType,
        from: impl Into<String>,
        to: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            kind,
            from: from.into(),
            to: to.into(),
            body: body.into(),
        }
    }

    /// Client admission request
    pub fn join() -> Self {
        Self::new(MessageType::Join, "", SERVER_IDENTITY, "")
    }

    /// Admission acknowledgement; body is the assigned session id
    pub fn join_ack(session_id: &str) -> Self {
        Self::new(MessageType::JoinAck, SERVER_IDENTITY, session_id, session_id)
    }

    /// Chat text
    pub fn chat(from: impl Into<String>, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(MessageType::Chat, from, to, body)
    }

    /// Server-authored chat addressed to every member
    pub fn system_chat(body: impl Into<String>) -> Self {
        Self::new(MessageType::Chat, SERVER_IDENTITY, ALL_IDENTITY, body)
    }

    /// Acknowledgement or command reply to one session
    pub fn chat_ack(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(MessageType::ChatAck, SERVER_IDENTITY, to, body)
    }

    /// Explicit departure
    pub fn leave() -> Self {
        Self::new(MessageType::Leave, "", SERVER_IDENTITY, "")
    }

    /// Failure report to one session
    pub fn error(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(MessageType::Error, SERVER_IDENTITY, to, body)
    }
}

/// Convert AppError to an error envelope for client notification
///
/// `to` is left empty; the handler addresses it once it knows who is asking.
impl From<AppError> for Message {
    fn from(err: AppError) -> Self {
        Message::error("", err.to_string())
    }
}
