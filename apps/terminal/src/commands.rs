//! Input lines parsed into user intents.

use std::path::PathBuf;

use thiserror::Error;

pub const HELP: &str = "\
/signup <first> <last> <email> <password>   create an account
/login <email> <password>                   sign in
/logout                                     sign out
/contacts                                   reload and list contacts
/online                                     toggle the online-only contact filter
/open <n|id|name>                           open a conversation
/close                                      close the conversation
/send [text]                                send the draft (plain text works too)
/image <path>                               attach an image to the draft (/image to remove)
/avatar <path>                              upload a profile picture
/profile                                    show your account
/help                                       this text
/quit                                       exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignUp {
        first_name: String,
        last_name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Contacts,
    ToggleOnlineOnly,
    Open(String),
    Close,
    Send(String),
    AttachImage(Option<PathBuf>),
    Avatar(PathBuf),
    Profile,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}; try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let words: Vec<&str> = args.split_whitespace().collect();

    let command = match name {
        "signup" => match words.as_slice() {
            [first, last, email, password] => Command::SignUp {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => return Err(CommandError::Usage("/signup <first> <last> <email> <password>")),
        },
        "login" => match words.as_slice() {
            [email, password] => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => return Err(CommandError::Usage("/login <email> <password>")),
        },
        "logout" => Command::Logout,
        "contacts" => Command::Contacts,
        "online" => Command::ToggleOnlineOnly,
        "open" if !args.is_empty() => Command::Open(args.to_string()),
        "open" => return Err(CommandError::Usage("/open <n|id|name>")),
        "close" => Command::Close,
        "send" => Command::Send(args.to_string()),
        "image" => Command::AttachImage(Some(args).filter(|a| !a.is_empty()).map(PathBuf::from)),
        "avatar" if !args.is_empty() => Command::Avatar(PathBuf::from(args)),
        "avatar" => return Err(CommandError::Usage("/avatar <path>")),
        "profile" => Command::Profile,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
