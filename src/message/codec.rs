//! Hex line codec.
//!
//! ```text
//! line     := hex( metaLine + "\n" + httpPayload ) + "\n"
//! metaLine := typeCode SP exchangeId (SP extraField)*
//! ```

use thiserror::Error;

use crate::message::{Message, MessageType};

/// Reasons an input line could not be turned into a [`Message`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("meta header has no line terminator")]
    MissingMetaTerminator,

    #[error("meta header needs a type and an id, found {0} field(s)")]
    MissingMetaFields(usize),

    #[error("meta header is not valid UTF-8")]
    MetaEncoding,

    #[error("unknown message type code {0:?}")]
    UnknownType(String),
}

/// Decode one hex line into a message.
///
/// Surrounding whitespace (including the line terminator) is ignored.
pub fn decode(line: &[u8]) -> Result<Message, CodecError> {
    let raw = hex::decode(line.trim_ascii())?;

    let meta_end = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(CodecError::MissingMetaTerminator)?;

    let meta = std::str::from_utf8(&raw[..meta_end]).map_err(|_| CodecError::MetaEncoding)?;
    Message::new(meta, raw[meta_end + 1..].to_vec())
}

/// Encode a message as one complete output line, terminator included.
pub fn encode(message: &Message) -> Vec<u8> {
    let meta = message.raw_meta().as_bytes();
    let payload = message.payload();

    let mut plain = Vec::with_capacity(meta.len() + 1 + payload.len());
    plain.extend_from_slice(meta);
    plain.push(b'\n');
    plain.extend_from_slice(payload);

    let mut line = hex::encode(plain).into_bytes();
    line.push(b'\n');
    line
}

/// Message type of an encoded line, read from its first byte only.
pub fn peek_type(line: &[u8]) -> Option<MessageType> {
    let hex_code = line.trim_ascii_start().get(..2)?;
    let mut code = [0u8; 1];
    hex::decode_to_slice(hex_code, &mut code).ok()?;
    MessageType::from_code(std::str::from_utf8(&code).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_line(plain: &[u8]) -> Vec<u8> {
        hex::encode(plain).into_bytes()
    }

    #[test]
    fn test_decode_message() {
        let line = hex_line(b"1 2 3\nGET / HTTP/1.1\r\n\r\n");
        let msg = decode(&line).unwrap();
        assert_eq!(msg.kind(), MessageType::Request);
        assert_eq!(msg.id(), "2");
        assert_eq!(msg.meta(), &["1", "2", "3"]);
        assert_eq!(msg.payload(), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_decode_ignores_line_terminator() {
        let mut line = hex_line(b"2 abc\nHTTP/1.1 200 OK\r\n\r\n");
        line.extend_from_slice(b"\r\n");
        let msg = decode(&line).unwrap();
        assert_eq!(msg.id(), "abc");
    }

    #[test]
    fn test_decode_keeps_binary_payload() {
        let mut plain = b"2 abc\nHTTP/1.1 200 OK\r\n\r\n".to_vec();
        plain.extend_from_slice(&[0x1f, 0x8b, 0x00, 0xff]);
        let msg = decode(&hex_line(&plain)).unwrap();
        assert!(msg.payload().ends_with(&[0x1f, 0x8b, 0x00, 0xff]));
    }

    #[test]
    fn test_decode_bad_hex() {
        assert!(matches!(decode(b"zz"), Err(CodecError::Hex(_))));
        assert!(matches!(decode(b"abc"), Err(CodecError::Hex(_))));
    }

    #[test]
    fn test_decode_missing_meta_terminator() {
        let line = hex_line(b"1 2 3");
        assert!(matches!(decode(&line), Err(CodecError::MissingMetaTerminator)));
    }

    #[test]
    fn test_decode_missing_id() {
        let line = hex_line(b"1\nGET / HTTP/1.1\r\n\r\n");
        assert!(matches!(decode(&line), Err(CodecError::MissingMetaFields(1))));
    }

    #[test]
    fn test_round_trip() {
        let original = hex_line(b"3 e1f0 1500000000 12\nGET /a?b=c HTTP/1.1\r\nHost: x\r\n\r\n");
        let msg = decode(&original).unwrap();
        let encoded = encode(&msg);

        assert_eq!(encoded.last(), Some(&b'\n'));
        assert_eq!(&encoded[..encoded.len() - 1], original.as_slice());

        let again = decode(&encoded).unwrap();
        assert_eq!(again.id(), msg.id());
        assert_eq!(again.kind(), msg.kind());
        assert_eq!(again.payload(), msg.payload());
    }

    #[test]
    fn test_peek_type() {
        let msg = Message::new("3 abc", b"GET / HTTP/1.1\r\n\r\n".to_vec()).unwrap();
        assert_eq!(peek_type(&encode(&msg)), Some(MessageType::Replay));
        assert_eq!(peek_type(b"zz"), None);
        assert_eq!(peek_type(b""), None);
    }
}
