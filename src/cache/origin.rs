//! The authoritative layer behind both tiers.

use async_trait::async_trait;
use axum::http::HeaderMap;

use super::entry::CachedResponse;
use super::error::OriginError;

/// Which origin base a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// Root and tenant pages.
    Pages,
    /// Shared static assets, identical for every tenant.
    Assets,
}

#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub upstream: Upstream,
    /// Resolved path, including the query string.
    pub path: String,
    /// Request headers forwarded upstream.
    pub headers: HeaderMap,
}

impl OriginRequest {
    pub fn new(upstream: Upstream, path: impl Into<String>) -> Self {
        Self {
            upstream,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Raw origin response, before header hygiene.
pub type OriginResponse = CachedResponse;

#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, OriginError>;
}
