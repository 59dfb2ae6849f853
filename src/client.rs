//! Client record held by the registry
//!
//! Represents an admitted session as seen by everyone else: its ids, its
//! current nickname and a handle to its outbound channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::Message;
use crate::types::{ConnectionId, SessionId};

/// Admitted client information
///
/// Cloned out of the registry for broadcasts, so sends never happen while
/// the registry lock is held.
#[derive(Debug, Clone)]
pub struct Client {
    /// Transport handle this record belongs to
    pub conn: ConnectionId,
    /// Session id granted on admission
    pub session_id: SessionId,
    /// Current nickname
    pub nickname: String,
    /// Server → client message channel
    pub sender: mpsc::Sender<Message>,
}

impl Client {
    /// Create a client whose nickname defaults to its session id
    pub fn new(conn: ConnectionId, session_id: SessionId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            conn,
            session_id,
            nickname: session_id.to_string(),
            sender,
        }
    }

    /// Queue a message for this client without waiting
    ///
    /// Returns an error if the channel is closed (client disconnected) or
    /// full (client not reading). Never blocks the caller.
    pub fn try_deliver(&self, msg: Message) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::ChannelFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let client = Client::new(ConnectionId::new(), SessionId(4), tx);

        assert_eq!(client.nickname, "client-4");
        assert_eq!(client.session_id, SessionId(4));
    }

    #[tokio::test]
    async fn test_client_try_deliver() {
        let (tx, mut rx) = mpsc::channel(32);
        let client = Client::new(ConnectionId::new(), SessionId(1), tx);

        client.try_deliver(Message::system_chat("hello")).unwrap();
        assert_eq!(rx.recv().await.unwrap().body, "hello");

        drop(rx);
        assert!(matches!(
            client.try_deliver(Message::system_chat("gone")),
            Err(SendError::ChannelClosed)
        ));
    }

    #[test]
    fn test_client_try_deliver_full() {
        let (tx, _rx) = mpsc::channel(1);
        let client = Client::new(ConnectionId::new(), SessionId(1), tx);

        client.try_deliver(Message::system_chat("first")).unwrap();
        assert!(matches!(
            client.try_deliver(Message::system_chat("second")),
            Err(SendError::ChannelFull)
        ));
    }
}
