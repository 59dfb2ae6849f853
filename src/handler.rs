//! TCP connection handler
//!
//! Handles one accepted connection: splits it into a read loop (frames →
//! `ChatServer`) and a write task (outbound channel → frames), and tears the
//! session down exactly once when the read loop ends, whichever way it ends.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::codec::{encode, line_codec};
use crate::error::AppError;
use crate::message::Message;
use crate::server::{ChatServer, Flow};
use crate::session::Session;
use crate::types::ConnectionId;

/// Handle a new TCP connection
///
/// Returns when the peer disconnects, the session leaves, or the transport
/// fails. Registry cleanup has run by the time this returns.
pub async fn handle_connection(stream: TcpStream, server: Arc<ChatServer>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let conn = ConnectionId::new();
    info!("Connection {} accepted from {}", conn, peer_addr);

    let config = server.config();
    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, line_codec(config.max_line_length));
    let sink = FramedWrite::new(write_half, line_codec(config.max_line_length));

    // Create channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(config.outbound_buffer);
    let write_task = tokio::spawn(write_loop(
        conn,
        sink,
        msg_rx,
        config.protocol_version.clone(),
    ));

    let mut session = Session::new(conn, msg_tx);
    let result = read_loop(&server, &mut session, &mut frames).await;

    session.teardown(server.registry());
    // Dropping the last local sender lets the writer drain and close.
    drop(session);
    if let Err(e) = write_task.await {
        error!("Write task for {} panicked: {}", conn, e);
    }

    info!("Connection {} from {} closed", conn, peer_addr);
    result
}

/// Read frames until EOF, Leave, or a fatal error
async fn read_loop(
    server: &ChatServer,
    session: &mut Session,
    frames: &mut FramedRead<OwnedReadHalf, LinesCodec>,
) -> Result<(), AppError> {
    loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = session.closed() => {
                debug!("Writer for {} gone, ending read loop", session.conn);
                return Ok(());
            }
        };

        let line = match frame {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(e.into()),
            None => {
                debug!("Connection {} reached EOF", session.conn);
                return Ok(());
            }
        };

        match server.handle_frame(session, &line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Failed to process message from {}: {}", session.conn, e);
                server.report(session, e).await?;
            }
        }
    }
}

/// Drain the outbound channel onto the socket
///
/// Every message is stamped with the server's protocol version before
/// encoding. Ends when all senders are dropped or a write fails.
async fn write_loop(
    conn: ConnectionId,
    mut sink: FramedWrite<OwnedWriteHalf, LinesCodec>,
    mut msg_rx: mpsc::Receiver<Message>,
    version: String,
) {
    while let Some(mut msg) = msg_rx.recv().await {
        msg.version.clone_from(&version);
        match encode(&msg) {
            Ok(line) => {
                if let Err(e) = sink.send(line).await {
                    debug!("Write to {} failed, ending write task: {}", conn, e);
                    break;
                }
            }
            Err(e) => {
                // Continue - don't break on serialization errors
                error!("Failed to serialize message for {}: {}", conn, e);
            }
        }
    }
    debug!("Write task ended for {}", conn);

    let _ = SinkExt::<String>::close(&mut sink).await;
}
