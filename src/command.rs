//! Chat commands and direct messages
//!
//! A chat body starting with `/` is a command, one starting with `@` is a
//! direct message. Commands go through parse → validate → execute:
//!
//! - `/nick <name>` renames the sender and announces `old -> new` to every
//!   member, the renamer included
//! - `/who` lists the current nicknames back to the sender
//! - anything else gets a `chat_ack` of "unknown command"

use tracing::{debug, warn};

use crate::broadcast::broadcast;
use crate::error::AppError;
use crate::message::{Message, UNKNOWN_COMMAND_BODY};
use crate::registry::ClientRegistry;
use crate::session::Session;

/// Prefix marking a chat body as a command
pub const COMMAND_SIGIL: char = '/';

/// Prefix marking a chat body as a direct message
pub const DIRECT_SIGIL: char = '@';

/// Whitespace-tokenized command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// First token, sigil included (`/nick`)
    pub name: String,
    pub args: Vec<String>,
}

/// A command that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick { nick: String },
    Who,
    Unknown { name: String },
}

/// Split a command body into name and arguments
pub fn parse(body: &str) -> Result<ParsedCommand, AppError> {
    let mut parts = body.split_whitespace().map(str::to_string);
    let name = parts.next().ok_or(AppError::EmptyCommand)?;
    Ok(ParsedCommand {
        name,
        args: parts.collect(),
    })
}

/// Check arguments and registry state for a parsed command
///
/// For `/nick` this checks argument count, minimum length, the reserved set
/// and current uniqueness, all under the registry lock. The rename itself
/// checks again, since another session may take the name in between.
pub fn validate(parsed: ParsedCommand, registry: &ClientRegistry) -> Result<Command, AppError> {
    let ParsedCommand { name, args } = parsed;
    match name.as_str() {
        "/nick" => {
            let nick = args.into_iter().next().ok_or(AppError::InvalidArguments)?;
            registry.validate_nick(&nick)?;
            Ok(Command::Nick { nick })
        }
        "/who" => Ok(Command::Who),
        _ => Ok(Command::Unknown { name }),
    }
}

/// Run a validated command on behalf of `session`
pub async fn execute(
    command: Command,
    session: &Session,
    registry: &ClientRegistry,
) -> Result<(), AppError> {
    match command {
        Command::Nick { nick } => {
            let (old, new) = registry.rename_nick(session.conn, &nick)?;
            let announcement = Message::system_chat(format!("{} -> {}", old, new));
            broadcast(registry, &announcement, None);
            Ok(())
        }
        Command::Who => {
            let body = registry.nicknames().join(", ");
            session
                .send(Message::chat_ack(session.reply_to(), body))
                .await?;
            Ok(())
        }
        Command::Unknown { name } => {
            debug!("Unknown command {} from {}", name, session.reply_to());
            session
                .send(Message::chat_ack(session.reply_to(), UNKNOWN_COMMAND_BODY))
                .await?;
            Ok(())
        }
    }
}

/// Parse, validate and execute a command body
pub async fn handle_command(
    body: &str,
    session: &Session,
    registry: &ClientRegistry,
) -> Result<(), AppError> {
    let parsed = parse(body)?;
    let command = validate(parsed, registry)?;
    execute(command, session, registry).await
}

/// Split `@nick text` into recipient and text
pub fn parse_direct(body: &str) -> Result<(String, String), AppError> {
    let rest = body.strip_prefix(DIRECT_SIGIL).unwrap_or(body);
    let (nick, text) = rest
        .split_once(char::is_whitespace)
        .ok_or(AppError::InvalidArguments)?;
    let text = text.trim_start();
    if nick.is_empty() || text.is_empty() {
        return Err(AppError::InvalidArguments);
    }
    Ok((nick.to_string(), text.to_string()))
}

/// Deliver a direct message to the member holding the target nickname
pub async fn handle_direct(
    body: &str,
    session: &Session,
    registry: &ClientRegistry,
) -> Result<(), AppError> {
    let (nick, text) = parse_direct(body)?;
    let recipient = registry
        .find_by_nick(&nick)
        .ok_or_else(|| AppError::UnknownRecipient(nick.clone()))?;
    let from = registry
        .nickname_of(session.conn)
        .ok_or(AppError::Registry("session not admitted"))?;

    if let Err(e) = recipient.try_deliver(Message::chat(from, nick.as_str(), text)) {
        warn!("Direct message to {} failed: {}", nick, e);
    }
    session
        .send(Message::chat_ack(
            session.reply_to(),
            format!("Message sent to {}", nick),
        ))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::ChatConfig;
    use crate::message::{MessageType, SERVER_IDENTITY};
    use crate::types::ConnectionId;

    fn joined(registry: &ClientRegistry) -> (Session, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(8);
        let mut session = Session::new(ConnectionId::new(), tx);
        let id = registry.admit(session.conn, session.sender()).unwrap();
        session.mark_joined(id).unwrap();
        (session, rx)
    }

    #[test]
    fn test_parse() {
        let parsed = parse("/nick  bob   extra").unwrap();
        assert_eq!(parsed.name, "/nick");
        assert_eq!(parsed.args, vec!["bob", "extra"]);

        assert!(matches!(parse(""), Err(AppError::EmptyCommand)));
        assert!(matches!(parse("   \t"), Err(AppError::EmptyCommand)));
    }

    #[test]
    fn test_validate_nick() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (_s, _rx) = joined(&registry);

        assert_eq!(
            validate(parse("/nick bob").unwrap(), &registry).unwrap(),
            Command::Nick { nick: "bob".into() }
        );
        assert!(matches!(
            validate(parse("/nick").unwrap(), &registry),
            Err(AppError::InvalidArguments)
        ));
        assert!(matches!(
            validate(parse("/nick bo").unwrap(), &registry),
            Err(AppError::NameTooShort)
        ));
        assert!(matches!(
            validate(parse("/nick server").unwrap(), &registry),
            Err(AppError::NameReserved)
        ));
        assert!(matches!(
            validate(parse("/nick client-1").unwrap(), &registry),
            Err(AppError::NameReserved)
        ));
        assert_eq!(
            validate(parse("/dance now").unwrap(), &registry).unwrap(),
            Command::Unknown { name: "/dance".into() }
        );
    }

    #[tokio::test]
    async fn test_nick_announced_to_everyone() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, mut rx_a) = joined(&registry);
        let (_b, mut rx_b) = joined(&registry);

        handle_command("/nick bob", &a, &registry).await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.kind, MessageType::Chat);
            assert_eq!(msg.from, SERVER_IDENTITY);
            assert_eq!(msg.body, "client-1 -> bob");
        }
        assert_eq!(registry.nickname_of(a.conn).as_deref(), Some("bob"));
        assert!(registry.is_consistent());
    }

    #[tokio::test]
    async fn test_nick_conflict_leaves_registry_alone() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, _rx_a) = joined(&registry);
        let (b, mut rx_b) = joined(&registry);
        handle_command("/nick alice", &a, &registry).await.unwrap();
        while rx_b.try_recv().is_ok() {}

        let err = handle_command("/nick alice", &b, &registry).await.unwrap_err();
        assert!(matches!(err, AppError::NameConflict));
        assert_eq!(registry.nickname_of(b.conn).as_deref(), Some("client-2"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_command_acks_sender_only() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, mut rx_a) = joined(&registry);
        let (_b, mut rx_b) = joined(&registry);

        handle_command("/dance", &a, &registry).await.unwrap();

        let ack = rx_a.recv().await.unwrap();
        assert_eq!(ack.kind, MessageType::ChatAck);
        assert_eq!(ack.to, "client-1");
        assert_eq!(ack.body, UNKNOWN_COMMAND_BODY);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_who_lists_members() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, mut rx_a) = joined(&registry);
        let (_b, _rx_b) = joined(&registry);

        handle_command("/who", &a, &registry).await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap().body, "client-1, client-2");
    }

    #[tokio::test]
    async fn test_direct_message_to_stalled_member_does_not_block() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, mut rx_a) = joined(&registry);
        let (tx_b, _rx_b) = mpsc::channel(1);
        let b = ConnectionId::new();
        registry.admit(b, tx_b.clone()).unwrap();
        tx_b.try_send(Message::system_chat("backlog")).unwrap();

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            handle_direct("@client-2 hello", &a, &registry),
        )
        .await
        .expect("direct message must not wait on a full member")
        .unwrap();

        assert_eq!(rx_a.recv().await.unwrap().body, "Message sent to client-2");
        assert!(registry.nickname_of(b).is_some());
    }

    #[test]
    fn test_parse_direct() {
        assert_eq!(
            parse_direct("@bob hi there").unwrap(),
            ("bob".to_string(), "hi there".to_string())
        );
        assert!(matches!(parse_direct("@bob"), Err(AppError::InvalidArguments)));
        assert!(matches!(parse_direct("@bob   "), Err(AppError::InvalidArguments)));
        assert!(matches!(parse_direct("@ hi"), Err(AppError::InvalidArguments)));
    }

    #[tokio::test]
    async fn test_direct_message_reaches_only_target() {
        let registry = ClientRegistry::new(&ChatConfig::default());
        let (a, mut rx_a) = joined(&registry);
        let (b, mut rx_b) = joined(&registry);
        let (_c, mut rx_c) = joined(&registry);
        registry.rename_nick(b.conn, "bob").unwrap();

        handle_direct("@bob psst", &a, &registry).await.unwrap();

        let dm = rx_b.recv().await.unwrap();
        assert_eq!(dm.from, "client-1");
        assert_eq!(dm.to, "bob");
        assert_eq!(dm.body, "psst");
        assert_eq!(rx_a.recv().await.unwrap().body, "Message sent to bob");
        assert!(rx_c.try_recv().is_err());

        assert!(matches!(
            handle_direct("@nobody hi", &a, &registry).await,
            Err(AppError::UnknownRecipient(n)) if n == "nobody"
        ));
    }
}
