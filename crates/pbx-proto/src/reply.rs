//! Server reply lines.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::state::TuState;

/// One reply line from the exchange to a client.
///
/// State replies carry an optional numeric parameter: the unit's own
/// extension for `ON_HOOK` (and for the registration notification, whatever
/// the state), or the peer's session identifier for `CONNECTED`. The other
/// states are reported bare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The unit's current state, with its optional parameter.
    State { state: TuState, param: Option<u32> },
    /// A chat message relayed from the call peer.
    Chat(String),
}

impl Reply {
    /// A bare state reply.
    pub fn state(state: TuState) -> Reply {
        Reply::State { state, param: None }
    }

    /// A state reply carrying a parameter.
    pub fn state_with(state: TuState, param: u32) -> Reply {
        Reply::State {
            state,
            param: Some(param),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::State { state, param: None } => write!(f, "{state}"),
            Reply::State {
                state,
                param: Some(param),
            } => write!(f, "{state} {param}"),
            Reply::Chat(message) => write!(f, "CHAT {message}"),
        }
    }
}

impl FromStr for Reply {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Reply, ProtocolError> {
        if let Some(message) = line.strip_prefix("CHAT ") {
            return Ok(Reply::Chat(message.to_string()));
        }
        let (head, rest) = match line.split_once(' ') {
            Some((head, rest)) => (head, Some(rest)),
            None => (line, None),
        };
        let state = TuState::from_wire(head)
            .ok_or_else(|| ProtocolError::InvalidReply(line.to_string()))?;
        let param = match rest {
            None => None,
            Some(text) => Some(
                text.parse::<u32>()
                    .map_err(|_| ProtocolError::InvalidReply(line.to_string()))?,
            ),
        };
        Ok(Reply::State { state, param })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(Reply::state(TuState::DialTone).to_string(), "DIAL_TONE");
        assert_eq!(Reply::state_with(TuState::OnHook, 4).to_string(), "ON_HOOK 4");
        assert_eq!(
            Reply::state_with(TuState::Connected, 7).to_string(),
            "CONNECTED 7"
        );
        assert_eq!(Reply::Chat("hi".to_string()).to_string(), "CHAT hi");
        assert_eq!(Reply::Chat(String::new()).to_string(), "CHAT ");
    }

    #[test]
    fn parse_state_lines() {
        assert_eq!(
            "RING_BACK".parse::<Reply>().unwrap(),
            Reply::state(TuState::RingBack)
        );
        assert_eq!(
            "ON_HOOK 12".parse::<Reply>().unwrap(),
            Reply::state_with(TuState::OnHook, 12)
        );
    }

    #[test]
    fn parse_chat_preserves_message() {
        assert_eq!(
            "CHAT hello world".parse::<Reply>().unwrap(),
            Reply::Chat("hello world".to_string())
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("OFF_HOOK".parse::<Reply>().is_err());
        assert!("ON_HOOK twelve".parse::<Reply>().is_err());
        assert!("".parse::<Reply>().is_err());
    }
}
