mod content_api;
mod edge;
mod error;
mod internal;
mod middleware;

pub use edge::{EdgeState, build_edge_router};
pub use error::{JsonError, JsonErrorBody};
pub use internal::{InternalState, build_internal_router};
pub use middleware::REQUEST_ID_HEADER;

use axum::http::{HeaderMap, Uri, header::HOST};

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// Host the client addressed: `x-forwarded-host` when trusted, then `host`,
/// then the request-target authority.
pub(crate) fn request_host<'a>(
    headers: &'a HeaderMap,
    uri: &'a Uri,
    trust_forwarded: bool,
) -> &'a str {
    let forwarded = if trust_forwarded {
        header_str(headers, FORWARDED_HOST_HEADER)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
    } else {
        None
    };

    forwarded
        .or_else(|| header_str(headers, HOST.as_str()))
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or("")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_host_requires_trust() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "edge.internal".parse().unwrap());
        headers.insert(
            FORWARDED_HOST_HEADER,
            "cool.example.com, proxy.example.com".parse().unwrap(),
        );
        let uri = Uri::from_static("/");

        assert_eq!(request_host(&headers, &uri, false), "edge.internal");
        assert_eq!(request_host(&headers, &uri, true), "cool.example.com");
    }

    #[test]
    fn falls_back_to_authority() {
        let headers = HeaderMap::new();
        let uri = Uri::from_static("http://cool.example.com/posts");
        assert_eq!(request_host(&headers, &uri, false), "cool.example.com");
    }
}
