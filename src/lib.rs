//! Line-delimited TCP Chat Hub Library
//!
//! A small real-time chat hub: every accepted TCP connection becomes a
//! session that joins a single shared room and relays text to everyone else.
//!
//! # Features
//! - One JSON message envelope per line
//! - Join handshake granting sequential session ids (`client-1`, `client-2`, ...)
//! - Room-wide chat with sender acknowledgement
//! - Nickname changes (`/nick`), member listing (`/who`)
//! - Direct messages (`@nick text`)
//! - Guaranteed registry cleanup on leave or disconnect
//!
//! # Architecture
//! - `ChatServer` owns a `ClientRegistry` behind a single mutex; the lock is
//!   only held across in-memory updates, never across a send
//! - Each connection runs a read loop plus a write task fed by an `mpsc` channel
//! - Broadcasts snapshot the registry, release the lock, then fan out
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use lancom::{ChatConfig, ChatServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ChatConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     Arc::new(ChatServer::new(config)).serve(listener).await;
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use broadcast::{broadcast, BroadcastReport};
pub use client::Client;
pub use codec::{decode, encode};
pub use config::{ChatConfig, ReservedNames};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{Message, MessageType, PROTOCOL_VERSION, SERVER_IDENTITY};
pub use registry::ClientRegistry;
pub use server::{ChatServer, Flow};
pub use session::{Session, SessionState};
pub use types::{ConnectionId, SessionId};
