//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start over with only the system prompt.
    New,

    /// Exit the chat application.
    Exit,

    /// Display help information.
    Help,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Exit));
/// assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::New));
/// assert!(parse_command("What is 2+2?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "clear" | "reset" => ChatCommand::New,
        "exit" | "quit" | "q" => ChatCommand::Exit,
        "help" | "?" => ChatCommand::Help,
        "stats" => ChatCommand::Stats,
        "" => ChatCommand::Invalid("Empty command; try /help".to_string()),
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    match (result, argument) {
        (ChatCommand::Invalid(message), _) => Some(ChatCommand::Invalid(message)),
        (_, Some(_)) => Some(ChatCommand::Invalid(format!(
            "/{command} does not take an argument"
        ))),
        (result, None) => Some(result),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new conversation (aliases: /clear, /reset)
  /stats                 Show session statistics
  /help                  Show this help message (alias: /?)
  /exit                  Exit the chat (aliases: /quit, /q)

Ctrl+C interrupts a reply in progress; Ctrl+D exits."#
}
