//! Body access, chunked transfer decoding and gzip decompression.
//!
//! # Design Decisions
//! - The body starts after the first `CRLFCRLF`; no delimiter means no body
//! - `set_body` always rewrites `Content-Length`, so the two cannot drift
//! - Chunk decoding is driven purely by the chunk sizes, never by searching
//!   for delimiters inside chunk data

use std::io::Read;

use flate2::read::GzDecoder;

use crate::http::{find, headers, MutatorError};

const BODY_DELIMITER: &[u8] = b"\r\n\r\n";

/// Bytes after the header block, empty when there is no delimiter.
pub fn body(payload: &[u8]) -> &[u8] {
    match find(payload, BODY_DELIMITER) {
        Some(pos) => &payload[pos + BODY_DELIMITER.len()..],
        None => &[],
    }
}

/// Replace the body and set `Content-Length` to its byte length.
pub fn set_body(payload: &[u8], new_body: &[u8]) -> Vec<u8> {
    let mut out = headers::set_header(payload, "Content-Length", &new_body.len().to_string());

    match find(&out, BODY_DELIMITER) {
        Some(pos) => out.truncate(pos + BODY_DELIMITER.len()),
        None if out.ends_with(b"\r\n") => out.extend_from_slice(b"\r\n"),
        None => out.extend_from_slice(BODY_DELIMITER),
    }
    out.extend_from_slice(new_body);
    out
}

/// Decode a `Transfer-Encoding: chunked` body.
///
/// Chunk extensions are ignored and decoding stops at the zero-size chunk;
/// trailers after it are discarded.
pub fn decode_chunked(data: &[u8]) -> Result<Vec<u8>, MutatorError> {
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;

    loop {
        let size_end = find(&data[pos..], b"\r\n")
            .map(|offset| pos + offset)
            .ok_or_else(|| MutatorError::Chunked(format!("missing chunk size line at offset {pos}")))?;

        let size_field = &data[pos..size_end];
        let size_field = size_field
            .iter()
            .position(|&b| b == b';')
            .map(|ext| &size_field[..ext])
            .unwrap_or(size_field)
            .trim_ascii();

        let size = std::str::from_utf8(size_field)
            .ok()
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                MutatorError::Chunked(format!(
                    "invalid chunk size {:?}",
                    String::from_utf8_lossy(size_field)
                ))
            })?;
        pos = size_end + 2;

        if size == 0 {
            return Ok(out);
        }

        let chunk_end = pos
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| MutatorError::Chunked(format!("chunk of {size} bytes is truncated")))?;
        out.extend_from_slice(&data[pos..chunk_end]);
        pos = chunk_end;

        if data.get(pos..pos + 2) != Some(b"\r\n".as_slice()) {
            return Err(MutatorError::Chunked(format!(
                "missing CRLF after chunk ending at offset {pos}"
            )));
        }
        pos += 2;
    }
}

/// Gunzip `data`.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, MutatorError> {
    let mut decoder = GzDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(MutatorError::Decompress)?;

    Ok(output)
}

/// Body with transfer and content encodings removed.
///
/// Chunked framing is undone first (when `Transfer-Encoding` lists
/// `chunked`), then gzip (when `Content-Encoding` is `gzip`).
pub fn decoded_body(payload: &[u8]) -> Result<Vec<u8>, MutatorError> {
    let mut data = body(payload).to_vec();

    let chunked = headers::header_value(payload, "Transfer-Encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked {
        data = decode_chunked(&data)?;
    }

    let gzipped = headers::header_value(payload, "Content-Encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip") || v.eq_ignore_ascii_case("x-gzip"));
    if gzipped {
        data = decompress_gzip(&data)?;
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_body() {
        let payload = b"GET / HTTP/1.1\r\nUser-Agent: Python\r\nContent-Length: 5\r\n\r\nhello";
        assert_eq!(body(payload), b"hello");

        let invalid_payload = b"GET / HTTP/1.1\r\nUser-Agent: Python\r\nContent-Length: 5\r\nhello";
        assert_eq!(body(invalid_payload), b"");
    }

    #[test]
    fn test_set_body() {
        let payload = b"GET / HTTP/1.1\r\nUser-Agent: Python\r\nContent-Length: 5\r\n\r\nhello";
        let new_payload = set_body(payload, b"hello, world!");
        assert_eq!(
            new_payload,
            b"GET / HTTP/1.1\r\nUser-Agent: Python\r\nContent-Length: 13\r\n\r\nhello, world!"
        );
    }

    #[test]
    fn test_set_body_adds_content_length() {
        let payload = b"POST /submit HTTP/1.1\r\nHost: x\r\n\r\n";
        let new_payload = set_body(payload, b"{}");
        assert_eq!(
            new_payload,
            b"POST /submit HTTP/1.1\r\nContent-Length: 2\r\nHost: x\r\n\r\n{}"
        );
        assert_eq!(headers::header_value(&new_payload, "content-length").as_deref(), Some("2"));
        assert_eq!(body(&new_payload), b"{}");
    }

    #[test]
    fn test_set_body_without_delimiter() {
        let new_payload = set_body(b"HTTP/1.1 200 OK\r\n", b"ok");
        assert_eq!(new_payload, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    }

    #[test]
    fn test_decode_chunked() {
        let data = b"4\r\nWiki\r\n6\r\npedia \r\nE\r\nin \r\n\r\nchunks.\r\n0\r\n\r\n";
        assert_eq!(decode_chunked(data).unwrap(), b"Wikipedia in \r\n\r\nchunks.");
    }

    #[test]
    fn test_decode_chunked_with_extension() {
        let data = b"3;name=value\r\nabc\r\n0\r\n\r\n";
        assert_eq!(decode_chunked(data).unwrap(), b"abc");
    }

    #[test]
    fn test_decode_chunked_errors() {
        assert!(matches!(decode_chunked(b"zz\r\nabc\r\n"), Err(MutatorError::Chunked(_))));
        assert!(matches!(decode_chunked(b"10\r\nabc\r\n0\r\n\r\n"), Err(MutatorError::Chunked(_))));
        assert!(matches!(decode_chunked(b"3\r\nabcX0\r\n\r\n"), Err(MutatorError::Chunked(_))));
        assert!(matches!(decode_chunked(b"3\r\nabc\r\n"), Err(MutatorError::Chunked(_))));
    }

    #[test]
    fn test_decompress_gzip() {
        let compressed = gzip(b"hello gzip");
        assert_eq!(decompress_gzip(&compressed).unwrap(), b"hello gzip");
        assert!(matches!(decompress_gzip(b"not gzip at all"), Err(MutatorError::Decompress(_))));
    }

    #[test]
    fn test_decoded_body_chunked_gzip() {
        let compressed = gzip(b"{\"ok\":true}");
        let mut payload = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Encoding: gzip\r\n\r\n{:x}\r\n",
            compressed.len()
        )
        .into_bytes();
        payload.extend_from_slice(&compressed);
        payload.extend_from_slice(b"\r\n0\r\n\r\n");

        assert_eq!(decoded_body(&payload).unwrap(), b"{\"ok\":true}");
    }

    #[test]
    fn test_decoded_body_plain() {
        let payload = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        assert_eq!(decoded_body(payload).unwrap(), b"ok");
    }

    #[test]
    fn test_decoded_body_bad_gzip_is_an_error() {
        let payload = b"HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\n\r\nplain text";
        assert!(matches!(decoded_body(payload), Err(MutatorError::Decompress(_))));
    }
}
