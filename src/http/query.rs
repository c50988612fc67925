//! Query parameters of the request path.
//!
//! Values are form-decoded on read and form-encoded (`+` for spaces) on
//! write. Parameter names are matched and written as-is.

use url::form_urlencoded;

use crate::http::{start_line, MutatorError};

fn query(path: &str) -> Option<&str> {
    let (_, query) = path.split_once('?')?;
    Some(query.split_once('#').map(|(q, _)| q).unwrap_or(query))
}

/// All non-empty values of query parameter `name`, or `None` when absent.
pub fn path_param(payload: &[u8], name: &str) -> Option<Vec<String>> {
    let query = query(start_line::path(payload)?)?;

    let values: Vec<String> = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Set query parameter `name` to `value`.
///
/// Every existing `name=value` pair is rewritten in place; when there is
/// none, the pair is appended with `?` or `&` as appropriate.
pub fn set_path_param(payload: &[u8], name: &str, value: &str) -> Result<Vec<u8>, MutatorError> {
    let path = start_line::path(payload).ok_or(MutatorError::MissingStartLineSlot)?;
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    let pair = format!("{name}={encoded}");

    let new_path = match path.split_once('?') {
        Some((base, query)) if !query.is_empty() => {
            let mut replaced = false;
            let pairs: Vec<&str> = query
                .split('&')
                .map(|item| match item.split_once('=') {
                    Some((key, current)) if key == name && !current.is_empty() => {
                        replaced = true;
                        pair.as_str()
                    }
                    _ => item,
                })
                .collect();

            let mut new_path = format!("{base}?{}", pairs.join("&"));
            if !replaced {
                new_path.push('&');
                new_path.push_str(&pair);
            }
            new_path
        }
        Some((base, _)) => format!("{base}?{pair}"),
        None => format!("{path}?{pair}"),
    };

    start_line::set_path(payload, &new_path)
}
