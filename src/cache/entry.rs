//! Cached responses and their freshness windows.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use tokio::time::Instant;

use super::config::TierPolicy;
use super::keys::TagSet;

/// Response bytes plus header set, already sanitised for re-emission.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Only plain successful responses that carry no per-user state are stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && !self.headers.contains_key(axum::http::header::SET_COOKIE)
    }
}

/// Where an entry sits relative to its three thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Before fresh-until.
    Fresh,
    /// Between fresh-until and stale-serve-until: serve and revalidate.
    Stale,
    /// Between stale-serve-until and hard-expiry: serve only if origin fails.
    Degraded,
    /// At or past hard-expiry: never served.
    Expired,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Degraded => "degraded",
            Freshness::Expired => "expired",
        }
    }

    pub fn is_servable(self) -> bool {
        !matches!(self, Freshness::Expired)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: CachedResponse,
    pub tags: TagSet,
    /// When origin produced the response. Deadlines of every tier derive from it.
    pub fetched_at: Instant,
    pub fresh_until: Instant,
    pub stale_until: Instant,
    pub hard_expiry: Instant,
}

impl CacheEntry {
    pub fn new(
        response: CachedResponse,
        tags: TagSet,
        fetched_at: Instant,
        policy: &TierPolicy,
    ) -> Self {
        Self {
            response,
            tags,
            fetched_at,
            fresh_until: fetched_at + policy.fresh_for(),
            stale_until: fetched_at + policy.stale_serve_for(),
            hard_expiry: fetched_at + policy.hard_expiry_for(),
        }
    }

    pub fn freshness(&self, now: Instant) -> Freshness {
        if now < self.fresh_until {
            Freshness::Fresh
        } else if now < self.stale_until {
            Freshness::Stale
        } else if now < self.hard_expiry {
            Freshness::Degraded
        } else {
            Freshness::Expired
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.freshness(now) == Freshness::Expired
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}
