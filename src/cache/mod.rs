//! Tiered response cache and tag invalidation.
//!
//! Two tiers sit in front of origin:
//!
//! - **Regional**: consulted first, hour-scale freshness.
//! - **Shield**: edge-facing, short freshness with a long stale window.
//!
//! Entries are keyed by host class plus resolved path and tagged with their
//! owner plus any content tags reported by origin, so a single tag sweeps
//! every entry for a tenant or a post.
//!
//! ## Configuration
//!
//! ```toml
//! [cache.shield]
//! fresh_secs = 120
//! stale_while_revalidate_secs = 31556952
//! stale_if_error_secs = 86400
//! ```

mod config;
mod entry;
mod error;
mod headers;
mod invalidation;
mod keys;
mod ledger;
mod lock;
mod origin;
mod refresh;
mod store;
mod tiered;

pub use config::{CacheConfig, TierPolicy};
pub use entry::{CacheEntry, CachedResponse, Freshness};
pub use error::{InvalidationError, OriginError, TierError};
pub use headers::{CACHE_STATUS_HEADER, CACHE_TIER_HEADER};
pub use invalidation::{
    InvalidationCoordinator, InvalidationResult, InvalidationState, InvalidationTarget, Stage,
    StageReport,
};
pub use keys::{CacheKey, HostClass, SHARED_ASSETS_TAG, TagSet, Tier, entry_tags};
pub use ledger::{InvalidationLedger, InvalidationRequest};
pub use origin::{Origin, OriginRequest, OriginResponse, Upstream};
pub use refresh::RefreshTracker;
pub use store::{MemoryTierStore, TierStore};
pub use tiered::{CacheStatus, Lookup, Served, ServedFrom, TieredCache};
