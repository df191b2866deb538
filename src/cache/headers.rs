//! Header hygiene at tier boundaries.

use std::time::Duration;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Headers describing the framing of the upstream hop. A tier re-frames the
/// body on the way out, so these never survive a fetch.
const FRAMING_HEADERS: [HeaderName; 4] = [
    header::TRANSFER_ENCODING,
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::CONNECTION,
];

pub const CACHE_STATUS_HEADER: &str = "x-edge-cache";
pub const CACHE_TIER_HEADER: &str = "x-edge-tier";

pub fn strip_framing(headers: &mut HeaderMap) {
    for name in FRAMING_HEADERS {
        headers.remove(name);
    }
}

/// Remove every header whose name starts with one of `prefixes`.
pub fn strip_internal(headers: &mut HeaderMap, prefixes: &[String]) {
    if prefixes.is_empty() {
        return;
    }
    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| {
            prefixes
                .iter()
                .any(|prefix| name.as_str().starts_with(prefix.as_str()))
        })
        .cloned()
        .collect();
    for name in doomed {
        headers.remove(name);
    }
}

/// Remove the origin's tag header and return the tags it listed.
pub fn take_tags(headers: &mut HeaderMap, tag_header: &str) -> Vec<String> {
    let Ok(name) = HeaderName::from_bytes(tag_header.as_bytes()) else {
        return Vec::new();
    };
    let mut tags = Vec::new();
    if let header::Entry::Occupied(entry) = headers.entry(name) {
        for value in entry.remove_entry_mult().1 {
            if let Ok(raw) = value.to_str() {
                tags.extend(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|tag| !tag.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }
    tags
}

/// Overwrite a header by name, ignoring names or values that are not valid HTTP.
pub fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

/// Remove a header given by its configured name.
pub fn remove_header(headers: &mut HeaderMap, name: &str) {
    if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
        headers.remove(name);
    }
}

pub fn set_age(headers: &mut HeaderMap, age: Duration) {
    headers.insert(header::AGE, HeaderValue::from(age.as_secs()));
}
