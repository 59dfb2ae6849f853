//! Server configuration
//!
//! Built once at startup and shared read-only with every connection.

use std::collections::HashSet;
use std::sync::Arc;

use crate::message::PROTOCOL_VERSION;
use crate::types::SessionId;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9000";

/// Nicknames no client may take
pub const DEFAULT_RESERVED_NAMES: [&str; 5] = ["server", "client", "admin", "root", "system"];

/// Minimum nickname length in characters
pub const DEFAULT_MIN_NICK_LEN: usize = 3;

/// Longest accepted line in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Per-session outbound channel capacity
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Immutable set of reserved nicknames, matched case-insensitively
#[derive(Debug, Clone)]
pub struct ReservedNames(Arc<HashSet<String>>);

impl ReservedNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = names
            .into_iter()
            .map(|n| n.as_ref().to_lowercase())
            .collect();
        Self(Arc::new(set))
    }

    /// Returns true if `nick` is listed or looks like a session id
    ///
    /// Session-id-shaped names are held back so a rename can never collide
    /// with the default nickname of a later admission.
    pub fn contains(&self, nick: &str) -> bool {
        self.0.contains(&nick.to_lowercase()) || SessionId::is_session_id_shaped(nick)
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_NAMES)
    }
}

/// Chat hub configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Address the listener binds to
    pub bind_addr: String,
    /// Version string every inbound message must carry
    pub protocol_version: String,
    /// Reserved nicknames
    pub reserved_names: ReservedNames,
    /// Minimum nickname length in characters
    pub min_nick_len: usize,
    /// Longest accepted line in bytes
    pub max_line_length: usize,
    /// Per-session outbound channel capacity
    pub outbound_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            reserved_names: ReservedNames::default(),
            min_nick_len: DEFAULT_MIN_NICK_LEN,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ChatConfig {
    /// Build from command line arguments (program name already skipped)
    ///
    /// The first positional argument, if any, is the bind address.
    pub fn from_args<I>(mut args: I) -> Self
    where
        I: Iterator<Item = String>,
    {
        let mut config = Self::default();
        if let Some(addr) = args.next() {
            config.bind_addr = addr;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_case_insensitive() {
        let reserved = ReservedNames::default();
        assert!(reserved.contains("server"));
        assert!(reserved.contains("Admin"));
        assert!(reserved.contains("ROOT"));
        assert!(!reserved.contains("bob"));
    }

    #[test]
    fn test_reserved_session_id_shape() {
        let reserved = ReservedNames::default();
        assert!(reserved.contains("client-9"));
        assert!(!reserved.contains("client9x"));
    }

    #[test]
    fn test_from_args() {
        let config = ChatConfig::from_args(vec!["0.0.0.0:7000".to_string()].into_iter());
        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);

        let config = ChatConfig::from_args(std::iter::empty());
        assert_eq!(config.bind_addr, DEFAULT_ADDR);
        assert_eq!(config.min_nick_len, DEFAULT_MIN_NICK_LEN);
    }
}
