//! Turns server frames into the text shown to the user.

use chat_core::{Response, ResponseType};

/// Greeting printed once after a successful login.
pub fn welcome_banner(own_name: &str) -> String {
    format!(
        "=== Welcome {own_name} to Chat Relay! ===\n\
         1. show : Show all users online\n\
         2. talk <user> <message> : Send message to user\n\
         3. yell <message> : Send message to all users\n\
         4. creategroup <user1> <user2> ... : Create group chat\n\
         5. discuss <message> : Send message to users in the group chat\n\
         6. leavegroup : Leave group chat\n\
         7. help : Display all commands\n\
         8. exit : Disconnect from Chat server\n"
    )
}

/// Renders one response for display.
///
/// `own_name` is the name this client logged in with; it is used to mark the
/// caller in SHOW output and to leave it out of group member lists.  Plain
/// acknowledgements of TALK, YELL, and DISCUSS render as an empty string,
/// which callers skip.
pub fn render_response(response: &Response, own_name: &str) -> String {
    match response {
        Response::Login { .. } => format!("Logged in as {own_name}"),
        Response::Show { names } => {
            let mut out = String::from("=== Users Online ===");
            for (i, name) in names.iter().enumerate() {
                out.push_str(&format!("\n{}. {name}", i + 1));
                if name == own_name {
                    out.push_str(" (you)");
                }
            }
            out
        }
        Response::Talk | Response::Yell | Response::Discuss => String::new(),
        Response::CreateGroup { members } => {
            let others = others(members, own_name);
            if others.is_empty() {
                "Group chat created, but nobody could be invited".to_string()
            } else {
                format!("Group chat created with {}", others.join(", "))
            }
        }
        Response::LeaveGroup => "You left the group chat".to_string(),
        Response::Help { commands } => format!("Commands: {}", commands.join(" ")),
        Response::Exit => "You have logged out".to_string(),
        Response::TalkForward { sender, message } => format!("[{sender}] {message}"),
        Response::YellForward { sender, message } => format!("[{sender} to all] {message}"),
        Response::DiscussForward { sender, message } => format!("[{sender} to group] {message}"),
        Response::GroupInvite { members } => {
            let (initiator, rest) = match members.split_first() {
                Some((first, rest)) => (first.as_str(), rest),
                None => ("someone", &[][..]),
            };
            let others = others(rest, own_name);
            let mut out = format!("{initiator} invited you to a group chat");
            if !others.is_empty() {
                out.push_str(&format!(" with {}", others.join(", ")));
            }
            out.push_str(" (discuss to join, leavegroup to decline)");
            out
        }
        Response::ExitNotice { name } => format!("{name} has left the chat"),
        Response::Failure {
            kind: ResponseType::Error,
            status,
        } => format!("Server closed the session: {}", status.description()),
        Response::Failure { kind, status } => {
            format!("{} failed: {}", command_word(*kind), status.description())
        }
    }
}

fn others<'a>(members: &'a [String], own_name: &str) -> Vec<&'a str> {
    members
        .iter()
        .map(String::as_str)
        .filter(|name| *name != own_name)
        .collect()
}

fn command_word(kind: ResponseType) -> &'static str {
    match kind {
        ResponseType::Login => "login",
        ResponseType::Show => "show",
        ResponseType::Talk | ResponseType::TalkForward => "talk",
        ResponseType::Yell | ResponseType::YellForward => "yell",
        ResponseType::CreateGroup | ResponseType::GroupInvite => "creategroup",
        ResponseType::Discuss | ResponseType::DiscussForward => "discuss",
        ResponseType::LeaveGroup => "leavegroup",
        ResponseType::Help => "help",
        ResponseType::Exit | ResponseType::ExitNotice => "exit",
        ResponseType::Error => "request",
    }
}
