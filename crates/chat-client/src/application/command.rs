//! Parses the commands a user types at the `>` prompt.
//!
//! Each command maps onto exactly one [`Request`]:
//!
//! | Input                          | Request                 |
//! |--------------------------------|-------------------------|
//! | `show`                         | `Request::Show`         |
//! | `talk <user> <message...>`     | `Request::Talk`         |
//! | `yell <message...>`            | `Request::Yell`         |
//! | `creategroup <user> <user>...` | `Request::CreateGroup`  |
//! | `discuss <message...>`         | `Request::Discuss`      |
//! | `leavegroup`                   | `Request::LeaveGroup`   |
//! | `help`                         | `Request::Help`         |
//! | `exit`                         | `Request::Exit`         |
//!
//! Length limits are not checked here; the codec rejects oversized names and
//! messages when the request is encoded.

use chat_core::Request;
use thiserror::Error;

/// Command words, in the order the welcome banner lists them.
pub const COMMAND_WORDS: [&str; 8] = [
    "show",
    "talk",
    "yell",
    "creategroup",
    "discuss",
    "leavegroup",
    "help",
    "exit",
];

/// Errors from parsing one input line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The first word is not a known command.
    #[error("unknown command '{0}', type 'help' to see the commands")]
    Unknown(String),

    /// A required argument is missing.
    #[error("usage: {usage}")]
    MissingArgument { usage: &'static str },
}

/// Parses one input line.
///
/// Returns `Ok(None)` for a blank line.  Command words are case-insensitive;
/// arguments are kept as typed.  For `talk`, `yell`, and `discuss` the message
/// is the rest of the line after the command (and receiver), with leading
/// whitespace removed, so inner spacing survives.
///
/// # Errors
///
/// Returns [`CommandError::Unknown`] for an unrecognised command word and
/// [`CommandError::MissingArgument`] when `talk` has no receiver or
/// `creategroup` names nobody.
pub fn parse_command(line: &str) -> Result<Option<Request>, CommandError> {
    let line = line.trim();
    let (word, rest) = match split_word(line) {
        Some(parts) => parts,
        None => return Ok(None),
    };

    let request = match word.to_ascii_lowercase().as_str() {
        "show" => Request::Show,
        "talk" => {
            let (receiver, message) = split_word(rest).ok_or(CommandError::MissingArgument {
                usage: "talk <user> <message>",
            })?;
            Request::Talk {
                receiver: receiver.to_string(),
                message: message.to_string(),
            }
        }
        "yell" => Request::Yell {
            message: rest.to_string(),
        },
        "creategroup" => {
            let members: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if members.is_empty() {
                return Err(CommandError::MissingArgument {
                    usage: "creategroup <user1> <user2> ...",
                });
            }
            Request::CreateGroup { members }
        }
        "discuss" => Request::Discuss {
            message: rest.to_string(),
        },
        "leavegroup" => Request::LeaveGroup,
        "help" => Request::Help,
        "exit" => Request::Exit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };

    Ok(Some(request))
}

/// Splits off the first whitespace-delimited word.
///
/// Returns the word and the remainder with leading whitespace trimmed, or
/// `None` if `input` holds no word at all.
fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], input[end..].trim_start())),
        None => Some((input, "")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
