//! Method and path/status slot of the first line.
//!
//! Requests put the path in the second token of the first line, responses
//! put the status code there, so both share one slot.

use crate::http::MutatorError;

/// The first line without its line terminator.
fn first_line(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(payload.len());
    let line = &payload[..end];
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Byte range of the second token of the first line.
fn slot(payload: &[u8]) -> Option<(usize, usize)> {
    let line = first_line(payload);
    let start = line.iter().position(|&b| b == b' ')? + 1;
    let end = line[start..]
        .iter()
        .position(|&b| b == b' ')
        .map(|offset| start + offset)
        .unwrap_or(line.len());
    Some((start, end))
}

fn replace_slot(payload: &[u8], value: &str) -> Result<Vec<u8>, MutatorError> {
    let (start, end) = slot(payload).ok_or(MutatorError::MissingStartLineSlot)?;

    let mut out = Vec::with_capacity(payload.len() - (end - start) + value.len());
    out.extend_from_slice(&payload[..start]);
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(&payload[end..]);
    Ok(out)
}

/// Request method (`GET`, `POST`, ...), or the protocol for a response.
pub fn method(payload: &[u8]) -> Option<&str> {
    let line = first_line(payload);
    let end = line.iter().position(|&b| b == b' ')?;
    std::str::from_utf8(&line[..end]).ok()
}

/// Request path, query string included.
pub fn path(payload: &[u8]) -> Option<&str> {
    let (start, end) = slot(payload)?;
    std::str::from_utf8(&payload[start..end]).ok()
}

pub fn set_path(payload: &[u8], new_path: &str) -> Result<Vec<u8>, MutatorError> {
    replace_slot(payload, new_path)
}

/// Response status code.
pub fn status(payload: &[u8]) -> Option<&str> {
    path(payload)
}

pub fn set_status(payload: &[u8], new_status: &str) -> Result<Vec<u8>, MutatorError> {
    replace_slot(payload, new_status)
}
