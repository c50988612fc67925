//! Channel keys.
//!
//! `message` receives everything, `request` / `response` / `replay`
//! receive one category, and `<category>#<id>` receives one category of a
//! single exchange.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::message::{Message, MessageType};

const ALL_MESSAGES: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Every message.
    Message,
    /// Every message of one category.
    Category(MessageType),
    /// One category of one exchange.
    Exchange(MessageType, String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelKeyError {
    #[error("unknown channel {0:?}")]
    UnknownChannel(String),

    #[error("channel {0:?} cannot be scoped to an exchange id")]
    UnscopableChannel(String),

    #[error("exchange id in {0:?} is empty")]
    EmptyExchangeId(String),
}

impl ChannelKey {
    pub fn message() -> Self {
        ChannelKey::Message
    }

    pub fn category(kind: MessageType) -> Self {
        ChannelKey::Category(kind)
    }

    pub fn exchange(kind: MessageType, id: impl Into<String>) -> Self {
        ChannelKey::Exchange(kind, id.into())
    }

    /// The three keys a message is published on, in dispatch order.
    pub fn for_message(message: &Message) -> [ChannelKey; 3] {
        [
            ChannelKey::Message,
            ChannelKey::Category(message.kind()),
            ChannelKey::Exchange(message.kind(), message.id().to_string()),
        ]
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Message => f.write_str(ALL_MESSAGES),
            ChannelKey::Category(kind) => f.write_str(kind.channel()),
            ChannelKey::Exchange(kind, id) => write!(f, "{}#{}", kind.channel(), id),
        }
    }
}

impl FromStr for ChannelKey {
    type Err = ChannelKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, id) = match s.split_once('#') {
            Some((name, id)) => (name, Some(id)),
            None => (s, None),
        };

        if name == ALL_MESSAGES {
            return match id {
                None => Ok(ChannelKey::Message),
                Some(_) => Err(ChannelKeyError::UnscopableChannel(s.to_string())),
            };
        }

        let kind = MessageType::from_channel(name)
            .ok_or_else(|| ChannelKeyError::UnknownChannel(s.to_string()))?;
        match id {
            None => Ok(ChannelKey::Category(kind)),
            Some("") => Err(ChannelKeyError::EmptyExchangeId(s.to_string())),
            Some(id) => Ok(ChannelKey::Exchange(kind, id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for key in ["message", "request", "response", "replay", "response#2", "replay#a#b"] {
            let parsed: ChannelKey = key.parse().unwrap();
            assert_eq!(parsed.to_string(), key);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("nope".parse::<ChannelKey>(), Err(ChannelKeyError::UnknownChannel(_))));
        assert!(matches!(
            "message#1".parse::<ChannelKey>(),
            Err(ChannelKeyError::UnscopableChannel(_))
        ));
        assert!(matches!(
            "request#".parse::<ChannelKey>(),
            Err(ChannelKeyError::EmptyExchangeId(_))
        ));
    }

    #[test]
    fn test_keys_for_message() {
        let msg = Message::new("2 abc", b"HTTP/1.1 200 OK\r\n\r\n".to_vec()).unwrap();
        let keys: Vec<String> = ChannelKey::for_message(&msg).iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["message", "response", "response#abc"]);
    }
}
