//! Broadcast fan-out
//!
//! Snapshot the registry under its lock, release it, then send a copy of the
//! message to every member of the snapshot. A failed send to one member is
//! logged and skipped; that member is only removed when its own read loop
//! ends.

use tracing::{debug, warn};

use crate::message::Message;
use crate::registry::ClientRegistry;
use crate::types::ConnectionId;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members in the snapshot
    pub attempted: usize,
    /// Sends that hit a closed or full channel
    pub failed: usize,
}

impl BroadcastReport {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed
    }
}

/// Send `msg` to every member except `excluding`
///
/// Pass `None` to include everyone (server announcements). Best effort,
/// at most once per member of the snapshot. Sends never wait: a member whose
/// channel is full misses this message and the rest still get it.
pub fn broadcast(
    registry: &ClientRegistry,
    msg: &Message,
    excluding: Option<ConnectionId>,
) -> BroadcastReport {
    let members = registry.snapshot_members(excluding);
    let mut report = BroadcastReport {
        attempted: members.len(),
        failed: 0,
    };

    for member in &members {
        if let Err(e) = member.try_deliver(msg.clone()) {
            warn!(
                "Broadcast to {} ({}) failed: {}",
                member.session_id, member.nickname, e
            );
            report.failed += 1;
        }
    }

    debug!(
        "Broadcast {} from {:?}: {}/{} delivered",
        msg.kind,
        msg.from,
        report.delivered(),
        report.attempted
    );
    report
}
