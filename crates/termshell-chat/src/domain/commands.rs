//! Terminal command intake for the chat context.

use serde::{Deserialize, Serialize};
use termshell_core::error::ShellError;

/// Shown when a `message` command is too short.
pub const MESSAGE_USAGE: &str = "usage: message <npc_id> <text>";

/// Payload of `terminalCommand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalCommand {
    /// The raw line typed at the prompt.
    pub command: String,
}

/// A chat intent parsed from a terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `message <npc_id> <text...>` or `msg <npc_id> <text...>`.
    Message {
        /// Target NPC.
        npc_id: String,
        /// Message text, re-joined with single spaces.
        text: String,
    },
    /// `rerun`: regenerate the last reply.
    Rerun,
}

impl ChatCommand {
    /// Parses a terminal line.
    ///
    /// Returns `Ok(None)` for lines that are not chat commands so other
    /// subsystems can claim them.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::Validation` when a `message`/`msg` line has fewer
    /// than three whitespace-separated tokens.
    pub fn parse(line: &str) -> Result<Option<Self>, ShellError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = tokens.first() else {
            return Ok(None);
        };
        match keyword.to_ascii_lowercase().as_str() {
            "message" | "msg" => {
                if tokens.len() < 3 {
                    return Err(ShellError::Validation(MESSAGE_USAGE.to_owned()));
                }
                Ok(Some(Self::Message {
                    npc_id: tokens[1].to_owned(),
                    text: tokens[2..].join(" "),
                }))
            }
            "rerun" => Ok(Some(Self::Rerun)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_joins_remaining_tokens() {
        let parsed = ChatCommand::parse("message lab1   hello   there").unwrap();

        assert_eq!(
            parsed,
            Some(ChatCommand::Message {
                npc_id: "lab1".into(),
                text: "hello there".into(),
            })
        );
    }

    #[test]
    fn test_parse_accepts_msg_alias_case_insensitively() {
        let parsed = ChatCommand::parse("MSG guard who goes there").unwrap();

        assert_eq!(
            parsed,
            Some(ChatCommand::Message {
                npc_id: "guard".into(),
                text: "who goes there".into(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_message_with_too_few_tokens() {
        for line in ["message", "message lab1", "msg lab1   "] {
            let result = ChatCommand::parse(line);

            assert_eq!(
                result,
                Err(ShellError::Validation(MESSAGE_USAGE.to_owned())),
                "line: {line:?}"
            );
        }
    }

    #[test]
    fn test_parse_rerun() {
        assert_eq!(ChatCommand::parse("  rerun ").unwrap(), Some(ChatCommand::Rerun));
    }

    #[test]
    fn test_parse_ignores_other_commands() {
        assert_eq!(ChatCommand::parse("map north").unwrap(), None);
        assert_eq!(ChatCommand::parse("messages").unwrap(), None);
        assert_eq!(ChatCommand::parse("").unwrap(), None);
    }
}
