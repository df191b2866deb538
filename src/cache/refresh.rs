//! De-duplication of background origin refreshes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::refresh";

/// Set of keys with a refresh currently in flight.
#[derive(Default)]
pub struct RefreshTracker {
    in_flight: Mutex<HashSet<CacheKey>>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as refreshing. Returns `None` when a refresh is already running.
    ///
    /// The key is released when the returned guard drops, including when the
    /// refresh task is cancelled.
    pub fn try_start(self: &Arc<Self>, key: &CacheKey) -> Option<RefreshGuard> {
        let inserted = mutex_lock(&self.in_flight, SOURCE, "try_start").insert(key.clone());
        inserted.then(|| RefreshGuard {
            tracker: Arc::clone(self),
            key: key.clone(),
        })
    }

    pub fn is_refreshing(&self, key: &CacheKey) -> bool {
        mutex_lock(&self.in_flight, SOURCE, "is_refreshing").contains(key)
    }

    pub fn in_flight(&self) -> usize {
        mutex_lock(&self.in_flight, SOURCE, "in_flight").len()
    }
}

pub struct RefreshGuard {
    tracker: Arc<RefreshTracker>,
    key: CacheKey,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        mutex_lock(&self.tracker.in_flight, SOURCE, "finish").remove(&self.key);
    }
}
