//! Error types for the chat hub
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::MessageType;

/// Application-level errors
///
/// Covers both fatal errors (session teardown) and per-message errors
/// (an error envelope is sent back to the client, connection stays open).
#[derive(Debug, Error)]
pub enum AppError {
    /// Frame is not a valid JSON message envelope
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Message could not be serialized
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Protocol version does not match the server's
    #[error("protocol version mismatch: expected {expected}, got {found:?}")]
    VersionMismatch { expected: String, found: String },

    /// Body presence rule violated for the message type
    #[error("invalid message body for type {0}")]
    InvalidBody(MessageType),

    /// Server-only message authored by someone else
    #[error("acknowledgement can only be sent by server")]
    AckFromClient,

    /// Server-only message type arrived from a client
    #[error("unexpected message type {0} from client")]
    UnexpectedType(MessageType),

    /// Any non-join message before joining
    #[error("client must join first")]
    MustJoinFirst,

    /// Leave from a session that is not joined
    #[error("{0} is not joined")]
    NotJoined(String),

    /// Second join on the same session
    #[error("client has already joined")]
    AlreadyJoined,

    /// Command text has no tokens
    #[error("not a valid command")]
    EmptyCommand,

    /// Command or direct message is missing arguments
    #[error("invalid arguments")]
    InvalidArguments,

    /// Nickname is held by another session
    #[error("nick name already taken")]
    NameConflict,

    /// Nickname is in the reserved set
    #[error("nick name is reserved")]
    NameReserved,

    /// Nickname is below the minimum length
    #[error("nick name too short")]
    NameTooShort,

    /// Direct message target does not exist
    #[error("user {0} not found")]
    UnknownRecipient(String),

    /// Registry invariant violated by the caller (double admit, absent member)
    #[error("registry invariant violation: {0}")]
    Registry(&'static str),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing broke (over-long line, invalid UTF-8) (fatal)
    #[error("framing error: {0}")]
    Framing(#[from] tokio_util::codec::LinesCodecError),

    /// Outbound channel closed (fatal - writer task gone)
    #[error("Channel send error")]
    ChannelSend,
}

impl AppError {
    /// Returns true if the error ends the session instead of being reported
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Io(_) | AppError::Framing(_) | AppError::ChannelSend
        )
    }
}

impl From<SendError> for AppError {
    fn from(_: SendError) -> Self {
        AppError::ChannelSend
    }
}

/// Message send errors
///
/// Occurs when a message cannot be queued for a client.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client is not draining its channel
    #[error("Channel full")]
    ChannelFull,
}
