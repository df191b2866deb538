//! Tier storage.
//!
//! A tier store offers atomic per-key put/get and atomic tag-indexed delete.
//! The in-memory implementation keeps an LRU of entries plus a reverse index
//! from tag to keys, both behind a single lock.
//!
//! Deleting a tag also records when it happened. A later put of an entry
//! fetched at or before that moment is dropped, so a write that was already
//! in flight when the tag was invalidated cannot bring the old content back.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::error::{InvalidationError, TierError};
use super::invalidation::InvalidationTarget;
use super::keys::{CacheKey, Tier};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[async_trait]
pub trait TierStore: Send + Sync {
    fn tier(&self) -> Tier;

    /// Fetch an entry. Entries past hard-expiry are never returned.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, TierError>;

    /// Store an entry. Entries fetched at or before the last deletion of any
    /// of their tags are discarded.
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), TierError>;

    /// Delete every entry carrying `tag`; returns how many were removed.
    /// Deleting an unknown tag removes nothing and succeeds.
    async fn delete_tag(&self, tag: &str) -> Result<usize, TierError>;
}

struct TierState {
    entries: LruCache<CacheKey, CacheEntry>,
    by_tag: HashMap<String, HashSet<CacheKey>>,
    /// Last deletion time per tag.
    invalidated: HashMap<String, Instant>,
}

impl TierState {
    fn unindex(&mut self, key: &CacheKey, entry: &CacheEntry) {
        for tag in &entry.tags {
            if let Some(keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.unindex(key, &entry);
                true
            }
            None => false,
        }
    }

    fn predates_invalidation(&self, entry: &CacheEntry) -> bool {
        entry.tags.iter().any(|tag| {
            self.invalidated
                .get(tag)
                .is_some_and(|at| entry.fetched_at <= *at)
        })
    }

    /// Watermarks older than `retention` can only match entries that are
    /// already past hard-expiry.
    fn prune_watermarks(&mut self, now: Instant, retention: Duration) {
        self.invalidated
            .retain(|_, at| now.saturating_duration_since(*at) <= retention);
    }
}

/// Bounded in-memory tier.
pub struct MemoryTierStore {
    tier: Tier,
    watermark_retention: Duration,
    state: RwLock<TierState>,
}

impl MemoryTierStore {
    pub fn new(tier: Tier, config: &CacheConfig) -> Self {
        Self {
            tier,
            watermark_retention: config.policy(tier).hard_expiry_for(),
            state: RwLock::new(TierState {
                entries: LruCache::new(config.capacity_non_zero(tier)),
                by_tag: HashMap::new(),
                invalidated: HashMap::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.state, SOURCE, "contains")
            .entries
            .contains(key)
    }

    /// Number of live keys currently indexed under `tag`.
    pub fn tagged(&self, tag: &str) -> usize {
        rw_read(&self.state, SOURCE, "tagged")
            .by_tag
            .get(tag)
            .map_or(0, HashSet::len)
    }
}

#[async_trait]
impl TierStore for MemoryTierStore {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, TierError> {
        let now = Instant::now();
        let mut state = rw_write(&self.state, SOURCE, "get");
        match state.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
            Some(_) => {}
        }
        state.remove(key);
        debug!(tier = %self.tier, key = %key, "Evicted hard-expired entry");
        Ok(None)
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), TierError> {
        let mut state = rw_write(&self.state, SOURCE, "put");
        if state.predates_invalidation(&entry) {
            debug!(tier = %self.tier, key = %key, "Dropped write older than its invalidation");
            return Ok(());
        }
        state.remove(&key);
        for tag in &entry.tags {
            state
                .by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        if let Some((evicted_key, evicted)) = state.entries.push(key.clone(), entry)
            && evicted_key != key
        {
            state.unindex(&evicted_key, &evicted);
        }
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<usize, TierError> {
        let now = Instant::now();
        let mut state = rw_write(&self.state, SOURCE, "delete_tag");
        state.prune_watermarks(now, self.watermark_retention);
        state.invalidated.insert(tag.to_string(), now);
        let Some(keys) = state.by_tag.remove(tag) else {
            return Ok(0);
        };
        let mut removed = 0;
        for key in keys {
            if state.remove(&key) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl InvalidationTarget for MemoryTierStore {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, InvalidationError> {
        Ok(self.delete_tag(tag).await?)
    }
}
