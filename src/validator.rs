//! Message validation
//!
//! Two stages, run in order: syntax (version and body presence per type),
//! then semantics (who may send what). The session state gate sits between
//! them, see [`Session::gate`](crate::session::Session::gate).

use crate::error::AppError;
use crate::message::{Message, MessageType, SERVER_IDENTITY};
use crate::session::Session;

/// Field-presence rules
///
/// A version mismatch is reported before any other check here. The `type`
/// field is already known to be one of the six kinds: a frame whose type is
/// unknown never decodes, so it is reported as malformed whatever its
/// version says.
pub fn validate_syntax(msg: &Message, expected_version: &str) -> Result<(), AppError> {
    if msg.version != expected_version {
        return Err(AppError::VersionMismatch {
            expected: expected_version.to_string(),
            found: msg.version.clone(),
        });
    }

    match msg.kind {
        MessageType::Join => {
            if !msg.body.is_empty() {
                return Err(AppError::InvalidBody(msg.kind));
            }
        }
        MessageType::JoinAck | MessageType::Chat | MessageType::ChatAck => {
            if msg.body.is_empty() {
                return Err(AppError::InvalidBody(msg.kind));
            }
        }
        MessageType::Leave | MessageType::Error => {}
    }
    Ok(())
}

/// Role and state legality for a message from `session`
pub fn validate_semantics(msg: &Message, session: &Session) -> Result<(), AppError> {
    if msg.kind == MessageType::JoinAck && msg.from != SERVER_IDENTITY {
        return Err(AppError::AckFromClient);
    }
    if msg.kind == MessageType::Leave && !session.is_joined() {
        return Err(AppError::NotJoined(session.label()));
    }
    Ok(())
}
