//! Two-tier response cache with origin fallback.
//!
//! Lookup order is regional, then shield, then origin. Origin responses are
//! written to shield first and regional second. Entries past hard-expiry are
//! never served, even when origin is down.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::{CacheConfig, TierPolicy};
use super::entry::{CacheEntry, CachedResponse, Freshness};
use super::error::{OriginError, TierError};
use super::headers::{
    CACHE_STATUS_HEADER, CACHE_TIER_HEADER, remove_header, set_age, set_header, strip_framing,
    strip_internal, take_tags,
};
use super::keys::{CacheKey, TagSet, Tier, entry_tags};
use super::origin::{Origin, OriginRequest};
use super::refresh::RefreshTracker;
use super::store::TierStore;

const METRIC_CACHE_HIT: &str = "tenant_edge_cache_hit_total";
const METRIC_CACHE_MISS: &str = "tenant_edge_cache_miss_total";
const METRIC_CACHE_STALE_SERVED: &str = "tenant_edge_cache_stale_served_total";
const METRIC_BACKFILL_FAILED: &str = "tenant_edge_cache_backfill_failed_total";
const METRIC_ORIGIN_FETCH_MS: &str = "tenant_edge_origin_fetch_ms";
const METRIC_ORIGIN_ERROR: &str = "tenant_edge_origin_error_total";

/// Value of the cache status header on a served response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Tier(Tier),
    Origin,
}

impl ServedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            ServedFrom::Tier(tier) => tier.as_str(),
            ServedFrom::Origin => "origin",
        }
    }
}

/// Result of consulting both tiers without contacting origin.
#[derive(Debug)]
pub enum Lookup {
    /// A tier held a fresh entry.
    Fresh { tier: Tier, entry: CacheEntry },
    /// Best entry is inside its stale-while-revalidate window.
    Stale { tier: Tier, entry: CacheEntry },
    /// Nothing servable without origin. `fallback` is an entry past its
    /// revalidate window but before hard-expiry, usable only if origin fails.
    Miss { fallback: Option<(Tier, CacheEntry)> },
}

/// A response ready to leave the edge.
#[derive(Debug)]
pub struct Served {
    pub response: CachedResponse,
    pub status: CacheStatus,
    pub source: ServedFrom,
    pub age: Duration,
}

/// Origin response with its content tags, stamped with when the fetch began.
struct Fetched {
    response: CachedResponse,
    tags: Vec<String>,
    started_at: Instant,
}

struct Inner {
    config: CacheConfig,
    regional: Arc<dyn TierStore>,
    shield: Arc<dyn TierStore>,
    origin: Arc<dyn Origin>,
    refreshes: Arc<RefreshTracker>,
}

/// Shared handle to the tier pair. Cloning is cheap.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    pub fn new(
        config: CacheConfig,
        regional: Arc<dyn TierStore>,
        shield: Arc<dyn TierStore>,
        origin: Arc<dyn Origin>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                regional,
                shield,
                origin,
                refreshes: Arc::new(RefreshTracker::new()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.refreshes.in_flight()
    }

    fn store(&self, tier: Tier) -> &Arc<dyn TierStore> {
        match tier {
            Tier::Shield => &self.inner.shield,
            Tier::Regional => &self.inner.regional,
        }
    }

    /// Consult regional then shield. A fresh shield hit schedules a regional
    /// backfill without waiting for it.
    pub async fn get(&self, key: &CacheKey) -> Lookup {
        let now = Instant::now();
        let mut candidates: Vec<(Tier, CacheEntry)> = Vec::with_capacity(2);

        for tier in [Tier::Regional, Tier::Shield] {
            let Some(entry) = self.read_tier(tier, key).await else {
                continue;
            };
            let freshness = entry.freshness(now);
            if freshness == Freshness::Fresh {
                counter!(METRIC_CACHE_HIT, "tier" => tier.as_str()).increment(1);
                debug!(tier = %tier, outcome = "hit", key = %key, "Cache decision");
                if tier == Tier::Shield {
                    self.spawn_backfill(key.clone(), entry.clone());
                }
                return Lookup::Fresh { tier, entry };
            }
            if freshness.is_servable() {
                candidates.push((tier, entry));
            }
        }

        if let Some((tier, entry)) = newest(&candidates, now, Freshness::Stale) {
            debug!(tier = %tier, outcome = "stale", key = %key, "Cache decision");
            return Lookup::Stale { tier, entry };
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let fallback = newest(&candidates, now, Freshness::Degraded);
        debug!(
            outcome = "miss",
            key = %key,
            fallback = fallback.is_some(),
            "Cache decision"
        );
        Lookup::Miss { fallback }
    }

    /// Store a response in one tier with the given policy. Non-cacheable
    /// responses are skipped.
    pub async fn put(
        &self,
        tier: Tier,
        key: CacheKey,
        response: CachedResponse,
        tags: TagSet,
        ttl: &TierPolicy,
    ) -> Result<(), TierError> {
        if !response.is_cacheable() {
            return Ok(());
        }
        self.put_at(tier, key, response, tags, ttl, Instant::now()).await
    }

    async fn put_at(
        &self,
        tier: Tier,
        key: CacheKey,
        response: CachedResponse,
        tags: TagSet,
        ttl: &TierPolicy,
        fetched_at: Instant,
    ) -> Result<(), TierError> {
        let response = self.declare_policy(response, tier, ttl);
        let entry = CacheEntry::new(response, tags, fetched_at, ttl);
        self.store(tier).put(key, entry).await
    }

    /// Full request path: tiers, then origin, then stale-if-error fallback.
    pub async fn serve(
        &self,
        key: &CacheKey,
        request: OriginRequest,
    ) -> Result<Served, OriginError> {
        match self.get(key).await {
            Lookup::Fresh { tier, entry } => {
                let age = entry.age(Instant::now());
                Ok(self.emit(entry.response, CacheStatus::Hit, ServedFrom::Tier(tier), age))
            }
            Lookup::Stale { tier, entry } => {
                counter!(METRIC_CACHE_STALE_SERVED, "reason" => "revalidate").increment(1);
                self.spawn_refresh(key, request);
                let age = entry.age(Instant::now());
                Ok(self.emit(entry.response, CacheStatus::Stale, ServedFrom::Tier(tier), age))
            }
            Lookup::Miss { fallback } => match self.fetch_origin(request.clone()).await {
                Ok(fetched) => {
                    let response = fetched.response.clone();
                    self.populate(key, fetched).await;
                    Ok(self.emit(response, CacheStatus::Miss, ServedFrom::Origin, Duration::ZERO))
                }
                Err(err) => {
                    let now = Instant::now();
                    match fallback {
                        Some((tier, entry)) if !entry.is_expired(now) => {
                            warn!(
                                tier = %tier,
                                key = %key,
                                error = %err,
                                "Origin failed; serving stale entry"
                            );
                            counter!(METRIC_CACHE_STALE_SERVED, "reason" => "origin_error")
                                .increment(1);
                            self.spawn_refresh(key, request);
                            let age = entry.age(now);
                            Ok(self.emit(
                                entry.response,
                                CacheStatus::Stale,
                                ServedFrom::Tier(tier),
                                age,
                            ))
                        }
                        _ => Err(err),
                    }
                }
            },
        }
    }

    /// Fetch from origin without touching either tier.
    pub async fn pass_through(&self, request: OriginRequest) -> Result<Served, OriginError> {
        let fetched = self.fetch_origin(request).await?;
        Ok(self.emit(fetched.response, CacheStatus::Miss, ServedFrom::Origin, Duration::ZERO))
    }

    /// Start a background refresh of `key` unless one is already running.
    /// Returns whether a new refresh was spawned.
    pub fn spawn_refresh(&self, key: &CacheKey, request: OriginRequest) -> bool {
        let Some(guard) = self.inner.refreshes.try_start(key) else {
            debug!(key = %key, "Refresh already in flight");
            return false;
        };
        let cache = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match cache.fetch_origin(request).await {
                Ok(fetched) => cache.populate(&key, fetched).await,
                Err(err) => warn!(key = %key, error = %err, "Background refresh failed"),
            }
        });
        true
    }

    async fn read_tier(&self, tier: Tier, key: &CacheKey) -> Option<CacheEntry> {
        match self.store(tier).get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(tier = %tier, key = %key, error = %err, "Tier read failed; degrading");
                None
            }
        }
    }

    async fn fetch_origin(&self, request: OriginRequest) -> Result<Fetched, OriginError> {
        let config = &self.inner.config;
        let started_at = Instant::now();
        let result = tokio::time::timeout(config.origin_timeout, self.inner.origin.fetch(request))
            .await
            .unwrap_or(Err(OriginError::Timeout(config.origin_timeout)));
        histogram!(METRIC_ORIGIN_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let mut response = result
            .and_then(|response| {
                if response.body.len() > config.max_body_bytes {
                    Err(OriginError::Body(format!(
                        "{} bytes exceeds limit of {}",
                        response.body.len(),
                        config.max_body_bytes
                    )))
                } else {
                    Ok(response)
                }
            })
            .inspect_err(|err| {
                counter!(METRIC_ORIGIN_ERROR, "kind" => err.kind()).increment(1);
            })?;

        strip_framing(&mut response.headers);
        let tags = take_tags(&mut response.headers, &config.tag_header);
        Ok(Fetched {
            response,
            tags,
            started_at,
        })
    }

    /// Entries are stamped with the fetch start, so a fetch that began before
    /// an invalidation of one of its tags is refused by the stores.
    async fn populate(&self, key: &CacheKey, fetched: Fetched) {
        let Fetched {
            response,
            tags,
            started_at,
        } = fetched;
        if !response.is_cacheable() {
            debug!(key = %key, status = response.status.as_u16(), "Response not cacheable");
            return;
        }
        let tags = entry_tags(&key.host, tags);
        for tier in [Tier::Shield, Tier::Regional] {
            let policy = *self.inner.config.policy(tier);
            if let Err(err) = self
                .put_at(
                    tier,
                    key.clone(),
                    response.clone(),
                    tags.clone(),
                    &policy,
                    started_at,
                )
                .await
            {
                warn!(tier = %tier, key = %key, error = %err, "Tier population failed");
            }
        }
    }

    fn spawn_backfill(&self, key: CacheKey, entry: CacheEntry) {
        let cache = self.clone();
        tokio::spawn(async move {
            let policy = cache.inner.config.regional;
            let response = cache.declare_policy(entry.response, Tier::Regional, &policy);
            let backfill = CacheEntry::new(response, entry.tags, entry.fetched_at, &policy);
            if backfill.is_expired(Instant::now()) {
                return;
            }
            if let Err(err) = cache.inner.regional.put(key.clone(), backfill).await {
                counter!(METRIC_BACKFILL_FAILED).increment(1);
                warn!(key = %key, error = %err, "Regional backfill failed");
            }
        });
    }

    fn declare_policy(
        &self,
        mut response: CachedResponse,
        tier: Tier,
        policy: &TierPolicy,
    ) -> CachedResponse {
        let name = self.inner.config.header_name(tier);
        set_header(&mut response.headers, name, &policy.header_value());
        response
    }

    fn emit(
        &self,
        mut response: CachedResponse,
        status: CacheStatus,
        source: ServedFrom,
        age: Duration,
    ) -> Served {
        let config = &self.inner.config;
        let headers = &mut response.headers;
        strip_internal(headers, &config.internal_header_prefixes);
        remove_header(headers, &config.regional_header);
        set_header(headers, &config.shield_header, &config.shield.header_value());
        set_header(headers, CACHE_STATUS_HEADER, status.as_str());
        set_header(headers, CACHE_TIER_HEADER, source.as_str());
        set_age(headers, age);
        Served {
            response,
            status,
            source,
            age,
        }
    }
}

fn newest(
    candidates: &[(Tier, CacheEntry)],
    now: Instant,
    wanted: Freshness,
) -> Option<(Tier, CacheEntry)> {
    candidates
        .iter()
        .filter(|(_, entry)| entry.freshness(now) == wanted)
        .max_by_key(|(_, entry)| entry.fetched_at)
        .cloned()
}
