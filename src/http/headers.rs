//! Header lookup and rewriting.
//!
//! # Responsibilities
//! - Scan header lines left to right, after the first line and up to the
//!   empty line that ends the header block
//! - Split each line at its first `:` and compare names case-insensitively
//! - Rewrite a value in place, insert a new header after the first line,
//!   or remove a whole header line

/// Location of one header line inside a payload.
///
/// All offsets index the payload the span was computed from and are only
/// valid for that exact buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSpan {
    /// First byte of the header line.
    pub line_start: usize,
    /// Offset of the `:` separating name and value.
    pub colon: usize,
    /// First byte after the `:`.
    pub value_start: usize,
    /// First byte after the line terminator (or the payload end).
    pub line_end: usize,
}

impl HeaderSpan {
    /// Header name as written, surrounding whitespace removed.
    pub fn name<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        payload[self.line_start..self.colon].trim_ascii()
    }

    /// Header value, surrounding whitespace and line terminator removed.
    pub fn value<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        payload[self.value_start..self.line_end].trim_ascii()
    }
}

/// Header lines of the payload, in order.
fn scan(payload: &[u8]) -> impl Iterator<Item = HeaderSpan> + '_ {
    let mut pos = payload
        .iter()
        .position(|&b| b == b'\n')
        .map(|first| first + 1)
        .unwrap_or(payload.len());

    std::iter::from_fn(move || loop {
        if pos >= payload.len() {
            return None;
        }

        let line_start = pos;
        let line_end = payload[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|offset| line_start + offset + 1)
            .unwrap_or(payload.len());
        pos = line_end;

        let line = &payload[line_start..line_end];
        if line.trim_ascii().is_empty() {
            // end of the header block
            pos = payload.len();
            return None;
        }

        if let Some(offset) = line.iter().position(|&b| b == b':') {
            let colon = line_start + offset;
            return Some(HeaderSpan {
                line_start,
                colon,
                value_start: colon + 1,
                line_end,
            });
        }
    })
}

/// Find the first header called `name` (case-insensitive).
pub fn header(payload: &[u8], name: &str) -> Option<HeaderSpan> {
    let wanted = name.trim().as_bytes();
    scan(payload).find(|span| span.name(payload).eq_ignore_ascii_case(wanted))
}

/// Value of the first header called `name`.
pub fn header_value(payload: &[u8], name: &str) -> Option<String> {
    header(payload, name).map(|span| String::from_utf8_lossy(span.value(payload)).into_owned())
}

/// All headers as `(name, value)` pairs, in payload order.
pub fn headers(payload: &[u8]) -> Vec<(String, String)> {
    scan(payload)
        .map(|span| {
            (
                String::from_utf8_lossy(span.name(payload)).into_owned(),
                String::from_utf8_lossy(span.value(payload)).into_owned(),
            )
        })
        .collect()
}

/// Set header `name` to `value`.
///
/// An existing header keeps its name and position and only its value is
/// rewritten. A missing header is inserted right after the first line.
pub fn set_header(payload: &[u8], name: &str, value: &str) -> Vec<u8> {
    set_header_bytes(payload, name, value.as_bytes())
}

/// [`set_header`] for values that need not be UTF-8.
pub(crate) fn set_header_bytes(payload: &[u8], name: &str, value: &[u8]) -> Vec<u8> {
    match header(payload, name) {
        Some(span) => {
            let mut out = Vec::with_capacity(payload.len() + value.len() + 3);
            out.extend_from_slice(&payload[..span.value_start]);
            out.push(b' ');
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&payload[span.line_end..]);
            out
        }
        None => {
            let mut line = Vec::with_capacity(name.len() + value.len() + 4);
            line.extend_from_slice(name.as_bytes());
            line.extend_from_slice(b": ");
            line.extend_from_slice(value);
            line.extend_from_slice(b"\r\n");

            let mut out = Vec::with_capacity(payload.len() + line.len() + 2);
            match payload.iter().position(|&b| b == b'\n') {
                Some(first) => {
                    out.extend_from_slice(&payload[..first + 1]);
                    out.extend_from_slice(&line);
                    out.extend_from_slice(&payload[first + 1..]);
                }
                None => {
                    out.extend_from_slice(payload);
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(&line);
                }
            }
            out
        }
    }
}

/// Remove the first header called `name`; a missing header is a no-op.
pub fn delete_header(payload: &[u8], name: &str) -> Vec<u8> {
    match header(payload, name) {
        Some(span) => {
            let mut out = Vec::with_capacity(payload.len() - (span.line_end - span.line_start));
            out.extend_from_slice(&payload[..span.line_start]);
            out.extend_from_slice(&payload[span.line_end..]);
            out
        }
        None => payload.to_vec(),
    }
}
