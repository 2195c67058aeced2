//! Slash commands for interactive mode

/// Title used when none is given
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Result of parsing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Create a conversation and switch to it
    New(String),
    /// Switch to an existing conversation
    Open(i64),
    /// List conversations
    List,
    /// Leave the draft state / close the current conversation
    Close,
    /// Show a message to the user (not sent as a query)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command; `None` if `input` is a query
pub fn parse_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => {
            let title = if args.is_empty() { DEFAULT_TITLE } else { args };
            CommandResult::New(title.to_string())
        }

        "open" | "o" => match args.parse::<i64>() {
            Ok(id) => CommandResult::Open(id),
            Err(_) => CommandResult::Message(format!(
                "Usage: /open <conversation-id> (got {:?})",
                args
            )),
        },

        "list" | "l" => CommandResult::List,

        "close" => CommandResult::Close,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n [title]     Start a new conversation
  /open, /o <id>       Open a conversation and show its history
  /list, /l            List your conversations
  /close               Close the current conversation
  /quit, /exit, /q     Exit aura

Anything else is sent as a question. Press Ctrl-C to stop an answer."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("what is the leave policy?"), None);
    }

    #[test]
    fn test_new_with_and_without_title() {
        assert_eq!(
            parse_command("/new  Quarterly report "),
            Some(CommandResult::New("Quarterly report".into()))
        );
        assert_eq!(
            parse_command("/new"),
            Some(CommandResult::New(DEFAULT_TITLE.into()))
        );
    }

    #[test]
    fn test_open_requires_numeric_id() {
        assert_eq!(parse_command("/open 42"), Some(CommandResult::Open(42)));
        assert!(matches!(
            parse_command("/open latest"),
            Some(CommandResult::Message(_))
        ));
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!(parse_command("/Q"), Some(CommandResult::Exit));
        assert_eq!(parse_command("/l"), Some(CommandResult::List));
        assert_eq!(
            parse_command("/frobnicate"),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
    }
}
