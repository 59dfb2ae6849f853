//! Chat Hub - Entry Point
//!
//! Binds the TCP listener and hands it to the `ChatServer` accept loop.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lancom::{ChatConfig, ChatServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=lancom=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lancom=info")),
        )
        .init();

    // Bind address from command line or the default
    let config = ChatConfig::from_args(env::args().skip(1));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Protocol version {}, reserved nicknames enforced, minimum nickname length {}",
        config.protocol_version, config.min_nick_len
    );

    let server = Arc::new(ChatServer::new(config));
    server.serve(listener).await;

    Ok(())
}
