//! HTTP adapters for the authoritative origin: page/asset fetches and tag purges.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use reqwest::{Client, Url, redirect};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::cache::{
    InvalidationError, InvalidationTarget, Origin, OriginError, OriginRequest, OriginResponse,
    Upstream,
};
use crate::config::OriginSettings;

use super::error::InfraError;

/// Request headers that influence the rendered page and are safe to forward.
const FORWARDED_HEADERS: [header::HeaderName; 3] = [
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::USER_AGENT,
];

fn user_agent() -> &'static str {
    concat!("tenant-edge/", env!("CARGO_PKG_VERSION"))
}

fn build_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))
}

/// Fetches pages and shared assets from the configured origin bases.
///
/// The request path and query replace those of the base URL. The base scheme,
/// host and port are never taken from the request.
#[derive(Clone)]
pub struct HttpOrigin {
    client: Client,
    timeout: Duration,
    pages: Url,
    assets: Url,
}

impl HttpOrigin {
    pub fn new(settings: &OriginSettings) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client(settings.request_timeout)?,
            timeout: settings.request_timeout,
            pages: settings.pages_url.clone(),
            assets: settings.assets_url.clone(),
        })
    }

    fn url(&self, request: &OriginRequest) -> Url {
        let base = match request.upstream {
            Upstream::Pages => &self.pages,
            Upstream::Assets => &self.assets,
        };
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.path.as_str(), None),
        };
        let mut url = base.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

fn forwarded(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            out.insert(name, value.clone());
        }
    }
    out
}

#[async_trait]
impl Origin for HttpOrigin {
    #[instrument(skip(self, request), fields(upstream = ?request.upstream, path = %request.path))]
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, OriginError> {
        let url = self.url(&request);
        let response = self
            .client
            .get(url)
            .headers(forwarded(&request.headers))
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, self.timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                map_reqwest_error(err, self.timeout)
            } else {
                OriginError::Body(err.to_string())
            }
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "Origin responded");

        Ok(OriginResponse::new(status, headers, body))
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> OriginError {
    if err.is_timeout() {
        OriginError::Timeout(timeout)
    } else {
        OriginError::transport(err)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PurgeBody {
    error: Option<String>,
}

/// Deletes a tag at origin via `GET {base}{purge_path}?tag=`.
#[derive(Clone)]
pub struct HttpOriginPurge {
    client: Client,
    timeout: Duration,
    endpoint: Url,
}

impl HttpOriginPurge {
    pub fn new(settings: &OriginSettings) -> Result<Self, InfraError> {
        let endpoint = settings
            .pages_url
            .join(&settings.purge_path)
            .map_err(|err| InfraError::configuration(format!("invalid purge endpoint: {err}")))?;
        Ok(Self {
            client: build_client(settings.request_timeout)?,
            timeout: settings.request_timeout,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_for(&self, tag: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().clear().append_pair("tag", tag);
        url
    }
}

#[async_trait]
impl InvalidationTarget for HttpOriginPurge {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, InvalidationError> {
        let response = self
            .client
            .get(self.url_for(tag))
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, self.timeout))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| OriginError::Body(err.to_string()))?;
        let body: PurgeBody = serde_json::from_slice(&bytes).unwrap_or_default();

        if let Some(error) = body.error {
            return Err(OriginError::Status {
                status: status.as_u16(),
                detail: error,
            }
            .into());
        }
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
                detail: String::from_utf8_lossy(&bytes).into_owned(),
            }
            .into());
        }
        // Origin does not report how many entries it dropped.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pages: &str, assets: &str) -> OriginSettings {
        OriginSettings {
            pages_url: Url::parse(pages).unwrap(),
            assets_url: Url::parse(assets).unwrap(),
            purge_path: "/api/delete".to_string(),
            request_timeout: Duration::from_secs(1),
            tag_header: "cache-tag".to_string(),
        }
    }

    #[test]
    fn urls_follow_upstream() {
        let origin =
            HttpOrigin::new(&settings("http://pages.internal:4000", "http://assets.internal"))
                .unwrap();
        let page = origin.url(&OriginRequest::new(Upstream::Pages, "/s/cool/posts?page=2"));
        assert_eq!(page.as_str(), "http://pages.internal:4000/s/cool/posts?page=2");

        let asset = origin.url(&OriginRequest::new(Upstream::Assets, "/_next/static/app.js"));
        assert_eq!(asset.as_str(), "http://assets.internal/_next/static/app.js");
    }

    #[test]
    fn request_paths_never_change_the_origin_host() {
        let origin =
            HttpOrigin::new(&settings("http://pages.internal:4000", "http://assets.internal"))
                .unwrap();
        for path in ["//evil.example/steal", "http://evil.example/x", "/\\evil.example"] {
            let url = origin.url(&OriginRequest::new(Upstream::Pages, path));
            assert_eq!(url.host_str(), Some("pages.internal"), "{path}");
            assert_eq!(url.port(), Some(4000), "{path}");
        }
    }

    #[test]
    fn purge_url_encodes_tag() {
        let purge = HttpOriginPurge::new(&settings("http://core.internal", "http://core.internal"))
            .unwrap();
        assert_eq!(purge.endpoint().as_str(), "http://core.internal/api/delete");
        assert_eq!(
            purge.url_for("post:42").as_str(),
            "http://core.internal/api/delete?tag=post%3A42"
        );
    }

    #[test]
    fn only_whitelisted_headers_are_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        headers.insert(header::COOKIE, "session=1".parse().unwrap());
        headers.insert(header::USER_AGENT, "curl/8".parse().unwrap());

        let out = forwarded(&headers);
        assert_eq!(out.len(), 2);
        assert!(out.get(header::COOKIE).is_none());
    }
}
