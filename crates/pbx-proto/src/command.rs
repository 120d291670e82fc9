//! Client command parsing.

/// A parsed client command.
///
/// Command keywords are case-sensitive. Lines that match no command form at
/// all (unknown keyword, or `dial`/`chat` without a separating space) parse
/// to `None` and are dropped by the session layer without a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `pickup` - lift the handset.
    Pickup,
    /// `hangup` - replace the handset.
    Hangup,
    /// `dial <ext>` - call an extension.
    ///
    /// `None` means the target text was present but did not name a dialable
    /// extension (non-numeric, zero, negative, or out of range). That is a
    /// valid command with an unresolvable target, not a parse failure: it
    /// still reaches the exchange, which answers with the unit's error
    /// transition.
    Dial(Option<u32>),
    /// `chat <message>` - relay a message over a connected call. Leading
    /// spaces are trimmed; a bare `chat` sends the empty message.
    Chat(String),
}

impl Command {
    /// Parse one input line. Returns `None` for lines the exchange ignores.
    pub fn parse(line: &str) -> Option<Command> {
        match line {
            "pickup" => return Some(Command::Pickup),
            "hangup" => return Some(Command::Hangup),
            "chat" => return Some(Command::Chat(String::new())),
            _ => {}
        }
        if let Some(rest) = line.strip_prefix("dial") {
            // A separating space is required; "dial" alone or "dialx" is
            // not a dial command.
            if !rest.starts_with(' ') {
                return None;
            }
            return Some(Command::Dial(parse_extension(rest.trim_start_matches(' '))));
        }
        if let Some(rest) = line.strip_prefix("chat ") {
            return Some(Command::Chat(rest.trim_start_matches(' ').to_string()));
        }
        None
    }

    /// Command keyword, for logging and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Pickup => "pickup",
            Command::Hangup => "hangup",
            Command::Dial(_) => "dial",
            Command::Chat(_) => "chat",
        }
    }
}

/// Extensions are positive integers; anything else is unresolvable.
fn parse_extension(text: &str) -> Option<u32> {
    match text.parse::<i64>() {
        Ok(value) if value > 0 => u32::try_from(value).ok(),
        _ => None,
    }
}
