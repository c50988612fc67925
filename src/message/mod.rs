//! Exchange messages and the hex line codec.
//!
//! # Data Flow
//! ```text
//! input line (hex)
//!     → codec::decode (unhex, split meta header / payload)
//!     → Message (id, type, meta fields, raw meta, raw HTTP payload)
//!     → [dispatch registry, payload mutation]
//!     → codec::encode (raw meta + "\n" + payload, hex, "\n")
//!     → output line
//! ```
//!
//! # Design Decisions
//! - The meta header is kept verbatim so re-encoding never reorders or drops
//!   capture-tool specific fields
//! - The payload stays raw bytes; it is never parsed into a structured request
//! - `id` and `type` are fixed at construction; only the payload can change

pub mod codec;

use std::fmt;

pub use codec::{decode, encode, peek_type, CodecError};

/// Category of a captured record, taken from the first meta field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Request = 1,
    Response = 2,
    Replay = 3,
}

impl MessageType {
    /// Parse the wire type code (`"1"`, `"2"`, `"3"`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(MessageType::Request),
            "2" => Some(MessageType::Response),
            "3" => Some(MessageType::Replay),
            _ => None,
        }
    }

    /// The wire type code.
    pub fn code(&self) -> &'static str {
        match self {
            MessageType::Request => "1",
            MessageType::Response => "2",
            MessageType::Replay => "3",
        }
    }

    /// Name of the category channel messages of this type are published on.
    pub fn channel(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Replay => "replay",
        }
    }

    /// Inverse of [`MessageType::channel`].
    pub fn from_channel(name: &str) -> Option<Self> {
        match name {
            "request" => Some(MessageType::Request),
            "response" => Some(MessageType::Response),
            "replay" => Some(MessageType::Replay),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

/// One captured record: a meta header plus a raw HTTP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: String,
    kind: MessageType,
    meta: Vec<String>,
    raw_meta: String,
    payload: Vec<u8>,
}

impl Message {
    /// Build a message from a meta header line and a payload.
    ///
    /// The meta header is split on single spaces; the first field is the
    /// type code and the second the exchange id.
    pub fn new(raw_meta: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let raw_meta = raw_meta.into();
        let meta: Vec<String> = raw_meta.split(' ').map(str::to_string).collect();
        if meta.len() < 2 {
            return Err(CodecError::MissingMetaFields(meta.len()));
        }

        let kind = MessageType::from_code(&meta[0])
            .ok_or_else(|| CodecError::UnknownType(meta[0].clone()))?;
        let id = meta[1].clone();

        Ok(Self {
            id,
            kind,
            meta,
            raw_meta,
            payload: payload.into(),
        })
    }

    /// Exchange id shared by a request and its response/replay.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// All meta fields, including the type code and id.
    pub fn meta(&self) -> &[String] {
        &self.meta
    }

    /// The meta header exactly as it was received.
    pub fn raw_meta(&self) -> &str {
        &self.raw_meta
    }

    /// Raw HTTP bytes (start line, headers, optional body).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    /// Copy of this message carrying a different payload.
    ///
    /// This is how callbacks produce replacements: the meta header and id
    /// are carried over untouched.
    pub fn with_payload(&self, payload: impl Into<Vec<u8>>) -> Message {
        Message {
            id: self.id.clone(),
            kind: self.kind,
            meta: self.meta.clone(),
            raw_meta: self.raw_meta.clone(),
            payload: payload.into(),
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_parses_meta() {
        let msg = Message::new("2 abc 1500000000 42", b"HTTP/1.1 200 OK\r\n\r\n".to_vec()).unwrap();
        assert_eq!(msg.kind(), MessageType::Response);
        assert_eq!(msg.id(), "abc");
        assert_eq!(msg.meta(), &["2", "abc", "1500000000", "42"]);
        assert_eq!(msg.raw_meta(), "2 abc 1500000000 42");
    }

    #[test]
    fn test_new_rejects_short_meta() {
        let err = Message::new("1", Vec::new()).unwrap_err();
        assert!(matches!(err, CodecError::MissingMetaFields(1)));
    }

    #[test]
    fn test_new_rejects_unknown_type() {
        let err = Message::new("9 abc", Vec::new()).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(ref code) if code == "9"));
    }

    #[test]
    fn test_with_payload_keeps_identity() {
        let msg = Message::new("1 abc 7", b"GET / HTTP/1.1\r\n\r\n".to_vec()).unwrap();
        let replaced = msg.with_payload(b"GET /new HTTP/1.1\r\n\r\n".to_vec());
        assert_eq!(replaced.id(), msg.id());
        assert_eq!(replaced.raw_meta(), msg.raw_meta());
        assert_eq!(replaced.payload(), b"GET /new HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(MessageType::Request.channel(), "request");
        assert_eq!(MessageType::from_channel("replay"), Some(MessageType::Replay));
        assert_eq!(MessageType::from_channel("message"), None);
    }
}
