//! ChatServer implementation
//!
//! Owns the shared registry and configuration, and routes each decoded
//! message through validation, the session state gate and the type-specific
//! handler. One `ChatServer` is built at startup and shared by every
//! connection task behind an `Arc`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::broadcast::broadcast;
use crate::codec;
use crate::command::{self, COMMAND_SIGIL, DIRECT_SIGIL};
use crate::config::ChatConfig;
use crate::error::{AppError, SendError};
use crate::handler::handle_connection;
use crate::message::{Message, MessageType, ALL_IDENTITY, CHAT_ACK_BODY};
use crate::registry::ClientRegistry;
use crate::session::Session;
use crate::validator::{validate_semantics, validate_syntax};

/// What the read loop should do after a message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Session left; stop reading and close the transport
    Close,
}

/// The chat hub
pub struct ChatServer {
    config: ChatConfig,
    registry: ClientRegistry,
}

impl ChatServer {
    /// Create a server with an empty registry
    pub fn new(config: ChatConfig) -> Self {
        let registry = ClientRegistry::new(&config);
        Self { config, registry }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Accept connections forever, one task per connection
    ///
    /// Accept failures are logged and the loop keeps going; a session's
    /// failure never reaches this loop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("Chat server listening on {}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, server).await {
                            warn!("Connection from {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Decode one frame and handle it
    pub async fn handle_frame(&self, session: &mut Session, frame: &str) -> Result<Flow, AppError> {
        let msg = codec::decode(frame)?;
        self.handle_message(session, msg).await
    }

    /// Validate and route one message from `session`
    ///
    /// Errors returned here are per-message unless [`AppError::is_fatal`].
    pub async fn handle_message(&self, session: &mut Session, msg: Message) -> Result<Flow, AppError> {
        validate_syntax(&msg, &self.config.protocol_version)?;
        session.gate(msg.kind)?;
        validate_semantics(&msg, session)?;

        debug!("Routing {} from {}", msg.kind, session.conn);
        match msg.kind {
            MessageType::Join => self.handle_join(session).await,
            MessageType::Chat => self.handle_chat(session, msg).await,
            MessageType::Leave => Ok(self.handle_leave(session)),
            MessageType::JoinAck | MessageType::ChatAck | MessageType::Error => {
                Err(AppError::UnexpectedType(msg.kind))
            }
        }
    }

    /// `Unjoined → Joined`: admit, then acknowledge with the session id
    async fn handle_join(&self, session: &mut Session) -> Result<Flow, AppError> {
        let id = self.registry.admit(session.conn, session.sender())?;
        if let Err(e) = session.mark_joined(id) {
            self.registry.remove(session.conn);
            return Err(e);
        }

        info!("{} joined ({} online)", id, self.registry.len());
        session.send(Message::join_ack(&id.to_string())).await?;
        Ok(Flow::Continue)
    }

    /// Route chat to commands, direct messages or a room-wide broadcast
    async fn handle_chat(&self, session: &mut Session, mut msg: Message) -> Result<Flow, AppError> {
        if msg.body.starts_with(COMMAND_SIGIL) {
            command::handle_command(&msg.body, session, &self.registry).await?;
            return Ok(Flow::Continue);
        }
        if msg.body.starts_with(DIRECT_SIGIL) {
            command::handle_direct(&msg.body, session, &self.registry).await?;
            return Ok(Flow::Continue);
        }

        msg.from = self
            .registry
            .nickname_of(session.conn)
            .ok_or(AppError::Registry("session not admitted"))?;
        msg.to = ALL_IDENTITY.to_string();

        broadcast(&self.registry, &msg, Some(session.conn));
        session
            .send(Message::chat_ack(session.reply_to(), CHAT_ACK_BODY))
            .await?;
        Ok(Flow::Continue)
    }

    /// `Joined → Left`
    fn handle_leave(&self, session: &mut Session) -> Flow {
        info!("{} left", session.reply_to());
        session.teardown(&self.registry);
        Flow::Close
    }

    /// Send a per-message error back to the session that caused it
    pub async fn report(&self, session: &Session, err: AppError) -> Result<(), SendError> {
        let mut msg = Message::from(err);
        msg.to = session.reply_to();
        session.send(msg).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::message::{SERVER_IDENTITY, UNKNOWN_COMMAND_BODY};
    use crate::session::SessionState;
    use crate::types::ConnectionId;

    fn server() -> ChatServer {
        ChatServer::new(ChatConfig::default())
    }

    fn session() -> (Session, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(16);
        (Session::new(ConnectionId::new(), tx), rx)
    }

    async fn joined(server: &ChatServer) -> (Session, mpsc::Receiver<Message>) {
        let (mut s, mut rx) = session();
        server.handle_message(&mut s, Message::join()).await.unwrap();
        rx.recv().await.unwrap();
        (s, rx)
    }

    #[tokio::test]
    async fn test_join_acks_session_id() {
        let server = server();
        let (mut s, mut rx) = session();

        let flow = server.handle_message(&mut s, Message::join()).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        let ack = rx.recv().await.unwrap();
        assert_eq!(ack.kind, MessageType::JoinAck);
        assert_eq!(ack.body, "client-1");
        assert_eq!(ack.from, SERVER_IDENTITY);
        assert!(s.is_joined());
        assert_eq!(server.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_second_join_rejected() {
        let server = server();
        let (mut s, _rx) = joined(&server).await;

        let err = server.handle_message(&mut s, Message::join()).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyJoined));
        assert_eq!(server.registry().len(), 1);
        assert_eq!(s.state, SessionState::Joined(crate::types::SessionId(1)));
    }

    #[tokio::test]
    async fn test_must_join_first() {
        let server = server();
        let (mut s, _rx) = session();

        for msg in [Message::chat("", "", "hi"), Message::leave()] {
            let err = server.handle_message(&mut s, msg).await.unwrap_err();
            assert!(matches!(err, AppError::MustJoinFirst));
        }
        assert_eq!(s.state, SessionState::Unjoined);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_chat_broadcast_and_ack() {
        let server = server();
        let (mut a, mut rx_a) = joined(&server).await;
        let (_b, mut rx_b) = joined(&server).await;

        server
            .handle_message(&mut a, Message::chat("spoofed", "x", "hi"))
            .await
            .unwrap();

        let chat = rx_b.recv().await.unwrap();
        assert_eq!(chat.kind, MessageType::Chat);
        assert_eq!(chat.from, "client-1");
        assert_eq!(chat.to, ALL_IDENTITY);
        assert_eq!(chat.body, "hi");

        let ack = rx_a.recv().await.unwrap();
        assert_eq!(ack.kind, MessageType::ChatAck);
        assert_eq!(ack.body, CHAT_ACK_BODY);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_command_routing() {
        let server = server();
        let (mut a, mut rx_a) = joined(&server).await;

        server
            .handle_message(&mut a, Message::chat("", "", "/shrug"))
            .await
            .unwrap();
        assert_eq!(rx_a.recv().await.unwrap().body, UNKNOWN_COMMAND_BODY);

        let err = server
            .handle_message(&mut a, Message::chat("", "", "/nick server"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NameReserved));
        assert_eq!(server.registry().nickname_of(a.conn).as_deref(), Some("client-1"));
    }

    #[tokio::test]
    async fn test_leave_closes_and_deregisters() {
        let server = server();
        let (mut a, _rx) = joined(&server).await;

        let flow = server.handle_message(&mut a, Message::leave()).await.unwrap();

        assert_eq!(flow, Flow::Close);
        assert_eq!(a.state, SessionState::Left);
        assert!(server.registry().is_empty());
        assert!(!a.teardown(server.registry()));
    }

    #[tokio::test]
    async fn test_server_only_types_rejected() {
        let server = server();
        let (mut a, _rx) = joined(&server).await;

        let forged = Message::new(MessageType::JoinAck, "client-1", "", "client-1");
        assert!(matches!(
            server.handle_message(&mut a, forged).await,
            Err(AppError::AckFromClient)
        ));

        let ack = Message::chat_ack("client-1", "ok");
        assert!(matches!(
            server.handle_message(&mut a, ack).await,
            Err(AppError::UnexpectedType(MessageType::ChatAck))
        ));
    }

    #[tokio::test]
    async fn test_malformed_frame() {
        let server = server();
        let (mut s, _rx) = session();

        let err = server.handle_frame(&mut s, "{not json").await.unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
        assert!(!err.is_fatal());
        assert_eq!(s.state, SessionState::Unjoined);
    }

    #[tokio::test]
    async fn test_report_addresses_session() {
        let server = server();
        let (a, mut rx) = joined(&server).await;

        server.report(&a, AppError::NameConflict).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.kind, MessageType::Error);
        assert_eq!(msg.to, "client-1");
        assert_eq!(msg.body, "nick name already taken");
    }
}
