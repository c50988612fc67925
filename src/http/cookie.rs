//! Entries of the `Cookie` request header.
//!
//! The header value is a list of `name=value` entries separated by `"; "`.
//! Only the first `=` of an entry separates name from value. Entries are
//! handled as raw bytes, so ones that are not touched pass through exactly.

use crate::http::{find, headers};

const COOKIE: &str = "Cookie";
const SEPARATOR: &[u8] = b"; ";

fn entries(payload: &[u8]) -> Option<Vec<&[u8]>> {
    let span = headers::header(payload, COOKIE)?;
    let mut rest = span.value(payload);
    let mut entries = Vec::new();
    while let Some(pos) = find(rest, SEPARATOR) {
        entries.push(&rest[..pos]);
        rest = &rest[pos + SEPARATOR.len()..];
    }
    entries.push(rest);
    entries.retain(|entry| !entry.is_empty());
    Some(entries)
}

fn prefix(name: &str) -> Vec<u8> {
    format!("{name}=").into_bytes()
}

/// Value of the first cookie called `name`.
pub fn cookie(payload: &[u8], name: &str) -> Option<String> {
    let prefix = prefix(name);
    entries(payload)?
        .into_iter()
        .find_map(|entry| entry.strip_prefix(prefix.as_slice()))
        .map(|value| String::from_utf8_lossy(value).into_owned())
}

/// Replace every cookie called `name` with a single `name=value` entry at
/// the end of the list. Creates the `Cookie` header when missing.
pub fn set_cookie(payload: &[u8], name: &str, value: &str) -> Vec<u8> {
    let prefix = prefix(name);
    let mut replacement = prefix.clone();
    replacement.extend_from_slice(value.as_bytes());

    let mut cookies: Vec<&[u8]> = entries(payload)
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| !entry.starts_with(&prefix))
        .collect();
    cookies.push(&replacement);

    headers::set_header_bytes(payload, COOKIE, &cookies.join(SEPARATOR))
}

/// Remove every cookie called `name`.
///
/// The `Cookie` header itself is removed once its last entry is gone.
pub fn delete_cookie(payload: &[u8], name: &str) -> Vec<u8> {
    let Some(cookies) = entries(payload) else {
        return payload.to_vec();
    };

    let prefix = prefix(name);
    let kept: Vec<&[u8]> = cookies
        .into_iter()
        .filter(|entry| !entry.starts_with(&prefix))
        .collect();

    if kept.is_empty() {
        headers::delete_header(payload, COOKIE)
    } else {
        headers::set_header_bytes(payload, COOKIE, &kept.join(SEPARATOR))
    }
}
