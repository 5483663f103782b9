//! Parses a single raw terminal line into a [`UserCommand`]. Performs no FSM
//! checks — legality of a command in the current protocol state is C3's job.

use std::fmt;

use ipk24chat_wire::{ChannelId, Content, DisplayName, Secret, Username, ValidationError};

/// A recognized user command, ready to be checked against the FSM and
/// turned into wire traffic (or a local mutation, for `Rename`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Auth {
        username: Username,
        secret: Secret,
        display_name: DisplayName,
    },
    Join {
        channel_id: ChannelId,
    },
    Rename {
        display_name: DisplayName,
    },
    Message {
        content: Content,
    },
}

/// What parsing a line produced: a command, a request to print help (which
/// is a pure local side effect carrying no command), a user-visible error,
/// or nothing at all for a blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Command(UserCommand),
    HelpRequested,
    Error(CommandError),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand(String),
    WrongArgCount { command: &'static str, expected: usize, got: usize },
    InvalidField(ValidationError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            CommandError::WrongArgCount { command, expected, got } => write!(
                f,
                "{command} expects {expected} argument(s), got {got}"
            ),
            CommandError::InvalidField(e) => write!(f, "invalid argument: {e}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ValidationError> for CommandError {
    fn from(e: ValidationError) -> Self {
        CommandError::InvalidField(e)
    }
}

/// Parses one line of terminal input, as read with its trailing newline
/// already stripped.
pub fn parse(line: &str) -> ParseOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Empty;
    }

    if !trimmed.starts_with('/') {
        return match Content::try_from(trimmed) {
            Ok(content) => ParseOutcome::Command(UserCommand::Message { content }),
            Err(e) => ParseOutcome::Error(e.into()),
        };
    }

    let mut tokens = trimmed.split_whitespace();
    let command = tokens.next().unwrap_or("");
    let args: Vec<&str> = tokens.collect();

    match command {
        "/auth" => parse_auth(&args),
        "/join" => parse_join(&args),
        "/rename" => parse_rename(&args),
        "/help" => {
            if args.is_empty() {
                ParseOutcome::HelpRequested
            } else {
                ParseOutcome::Error(CommandError::WrongArgCount {
                    command: "/help",
                    expected: 0,
                    got: args.len(),
                })
            }
        }
        other => ParseOutcome::Error(CommandError::UnknownCommand(other.to_string())),
    }
}

fn parse_auth(args: &[&str]) -> ParseOutcome {
    if args.len() != 3 {
        return ParseOutcome::Error(CommandError::WrongArgCount {
            command: "/auth",
            expected: 3,
            got: args.len(),
        });
    }
    let username = match Username::try_from(args[0]) {
        Ok(v) => v,
        Err(e) => return ParseOutcome::Error(e.into()),
    };
    let secret = match Secret::try_from(args[1]) {
        Ok(v) => v,
        Err(e) => return ParseOutcome::Error(e.into()),
    };
    let display_name = match DisplayName::try_from(args[2]) {
        Ok(v) => v,
        Err(e) => return ParseOutcome::Error(e.into()),
    };
    ParseOutcome::Command(UserCommand::Auth {
        username,
        secret,
        display_name,
    })
}

fn parse_join(args: &[&str]) -> ParseOutcome {
    if args.len() != 1 {
        return ParseOutcome::Error(CommandError::WrongArgCount {
            command: "/join",
            expected: 1,
            got: args.len(),
        });
    }
    match ChannelId::try_from(args[0]) {
        Ok(channel_id) => ParseOutcome::Command(UserCommand::Join { channel_id }),
        Err(e) => ParseOutcome::Error(e.into()),
    }
}

fn parse_rename(args: &[&str]) -> ParseOutcome {
    if args.len() != 1 {
        return ParseOutcome::Error(CommandError::WrongArgCount {
            command: "/rename",
            expected: 1,
            got: args.len(),
        });
    }
    match DisplayName::try_from(args[0]) {
        Ok(display_name) => ParseOutcome::Command(UserCommand::Rename { display_name }),
        Err(e) => ParseOutcome::Error(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_is_empty() {
        assert_eq!(parse(""), ParseOutcome::Empty);
        assert_eq!(parse("   "), ParseOutcome::Empty);
    }

    #[test]
    fn bare_line_becomes_message() {
        match parse("hello  world") {
            ParseOutcome::Command(UserCommand::Message { content }) => {
                assert_eq!(content.as_str(), "hello  world");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn leading_trailing_whitespace_trimmed_internal_preserved() {
        match parse("  hi   there  ") {
            ParseOutcome::Command(UserCommand::Message { content }) => {
                assert_eq!(content.as_str(), "hi   there");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn auth_parses_three_tokens() {
        match parse("/auth alice s3cr3t Al") {
            ParseOutcome::Command(UserCommand::Auth {
                username,
                secret,
                display_name,
            }) => {
                assert_eq!(username.as_str(), "alice");
                assert_eq!(secret.as_str(), "s3cr3t");
                assert_eq!(display_name.as_str(), "Al");
            }
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn auth_rejects_wrong_arity() {
        assert_eq!(
            parse("/auth alice s3cr3t"),
            ParseOutcome::Error(CommandError::WrongArgCount {
                command: "/auth",
                expected: 3,
                got: 2,
            })
        );
    }

    #[test]
    fn join_parses_one_token() {
        match parse("/join lobby") {
            ParseOutcome::Command(UserCommand::Join { channel_id }) => {
                assert_eq!(channel_id.as_str(), "lobby");
            }
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn rename_parses_one_token() {
        match parse("/rename Bob") {
            ParseOutcome::Command(UserCommand::Rename { display_name }) => {
                assert_eq!(display_name.as_str(), "Bob");
            }
            other => panic!("expected Rename, got {other:?}"),
        }
    }

    #[test]
    fn help_takes_no_args() {
        assert_eq!(parse("/help"), ParseOutcome::HelpRequested);
        assert!(matches!(parse("/help now"), ParseOutcome::Error(_)));
    }

    #[test]
    fn unknown_slash_command_is_an_error() {
        assert_eq!(
            parse("/quit"),
            ParseOutcome::Error(CommandError::UnknownCommand("/quit".to_string()))
        );
    }
}
