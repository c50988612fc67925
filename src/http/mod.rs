//! Raw HTTP payload mutation.
//!
//! # Data Flow
//! ```text
//! Message payload (raw bytes)
//!     → start_line.rs (method, path / status slot)
//!     → query.rs (path query parameters)
//!     → headers.rs (single-pass header scan, set / insert / delete)
//!     → cookie.rs (entries of the Cookie header)
//!     → body.rs (body after CRLFCRLF, chunked framing, gzip)
//!     → new payload bytes handed back to the callback
//! ```
//!
//! # Design Decisions
//! - Every operation works on byte offsets of the current buffer; nothing
//!   is cached between calls, so offsets stay valid as lengths change
//! - Bytes that are not touched are passed through exactly
//! - Lookups return `Option`; only rewrites that have no slot to rewrite,
//!   chunk framing and decompression can fail
//! - No HTTP validation: malformed payloads are processed as far as the
//!   byte layout allows

pub mod body;
pub mod cookie;
pub mod headers;
pub mod query;
pub mod start_line;

use thiserror::Error;

pub use body::{body, decode_chunked, decoded_body, decompress_gzip, set_body};
pub use cookie::{cookie, delete_cookie, set_cookie};
pub use headers::{delete_header, header, header_value, headers, set_header, HeaderSpan};
pub use query::{path_param, set_path_param};
pub use start_line::{method, path, set_path, set_status, status};

/// Errors raised by payload rewrites and body decoding.
#[derive(Debug, Error)]
pub enum MutatorError {
    /// The first line has no second token to rewrite.
    #[error("payload has no path/status slot in its first line")]
    MissingStartLineSlot,

    /// The body is not valid chunked transfer framing.
    #[error("malformed chunked body: {0}")]
    Chunked(String),

    /// The body could not be gunzipped.
    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

/// Offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        assert_eq!(find(b"abc\r\n\r\ndef", b"\r\n\r\n"), Some(3));
        assert_eq!(find(b"abc", b"\r\n"), None);
        assert_eq!(find(b"", b"x"), None);
    }
}
