//! Wire codec
//!
//! `encode`/`decode` convert between [`Message`] and a single JSON text
//! record. Framing (the trailing `\n`) belongs to the transport, see
//! [`line_codec`].

use tokio_util::codec::LinesCodec;

use crate::error::AppError;
use crate::message::Message;

/// Serialize a message into one frame, without the line delimiter
pub fn encode(msg: &Message) -> Result<String, AppError> {
    serde_json::to_string(msg).map_err(AppError::Encode)
}

/// Parse one frame (delimiter already stripped) into a message
///
/// Unknown `type` values, missing `version`/`type`, and non-JSON input all
/// fail here; no domain logic may run on such a frame. This takes
/// precedence over the version check in
/// [`validate_syntax`](crate::validator::validate_syntax): an unknown type
/// with a wrong version is still a decode failure.
pub fn decode(frame: &str) -> Result<Message, AppError> {
    serde_json::from_str(frame).map_err(AppError::Decode)
}

/// Newline framing with an upper bound on line length
pub fn line_codec(max_line_length: usize) -> LinesCodec {
    LinesCodec::new_with_max_length(max_line_length)
}
