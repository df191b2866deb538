//! Cache configuration.
//!
//! Tier TTL policy and header names are configuration, loaded once at startup.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::keys::Tier;

const DEFAULT_SHIELD_FRESH_SECS: u64 = 120;
const DEFAULT_SHIELD_SWR_SECS: u64 = 31_556_952;
const DEFAULT_SHIELD_SIE_SECS: u64 = 86_400;
const DEFAULT_REGIONAL_FRESH_SECS: u64 = 3_600;
const DEFAULT_REGIONAL_SWR_SECS: u64 = 60;
const DEFAULT_REGIONAL_SIE_SECS: u64 = 3_600;
const DEFAULT_TIER_CAPACITY: usize = 1_000;
const DEFAULT_ORIGIN_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
pub(crate) const DEFAULT_SHIELD_HEADER: &str = "edge-cache-control";
pub(crate) const DEFAULT_REGIONAL_HEADER: &str = "regional-cache-control";
pub(crate) const DEFAULT_TAG_HEADER: &str = "cache-tag";
pub(crate) const DEFAULT_INTERNAL_HEADER_PREFIX: &str = "x-internal-";

/// Three ordered freshness thresholds for one tier, as offsets from fetch time.
///
/// `fresh-until < stale-serve-until < hard-expiry` holds whenever every window
/// is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Served without revalidation.
    pub fresh: Duration,
    /// After `fresh`, served while one background refresh runs.
    pub stale_while_revalidate: Duration,
    /// After the revalidate window, served only when origin fails.
    pub stale_if_error: Duration,
}

impl TierPolicy {
    pub const fn from_secs(fresh: u64, stale_while_revalidate: u64, stale_if_error: u64) -> Self {
        Self {
            fresh: Duration::from_secs(fresh),
            stale_while_revalidate: Duration::from_secs(stale_while_revalidate),
            stale_if_error: Duration::from_secs(stale_if_error),
        }
    }

    pub fn fresh_for(&self) -> Duration {
        self.fresh
    }

    pub fn stale_serve_for(&self) -> Duration {
        self.fresh + self.stale_while_revalidate
    }

    pub fn hard_expiry_for(&self) -> Duration {
        self.stale_serve_for() + self.stale_if_error
    }

    /// Value of the freshness header declaring this policy to the next hop.
    pub fn header_value(&self) -> String {
        format!(
            "s-maxage={}, stale-while-revalidate={}",
            self.fresh.as_secs(),
            self.stale_while_revalidate.as_secs()
        )
    }

    pub fn is_ordered(&self) -> bool {
        !self.fresh.is_zero()
            && !self.stale_while_revalidate.is_zero()
            && !self.stale_if_error.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub shield: TierPolicy,
    pub regional: TierPolicy,
    pub shield_capacity: usize,
    pub regional_capacity: usize,
    /// Header declaring the shield policy; always present on responses.
    pub shield_header: String,
    /// Header declaring the regional policy on entries stored in that tier.
    pub regional_header: String,
    /// Origin response header listing content tags, comma separated.
    pub tag_header: String,
    /// Header prefixes stripped before a response reaches a tenant.
    pub internal_header_prefixes: Vec<String>,
    pub max_body_bytes: usize,
    pub origin_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shield: TierPolicy::from_secs(
                DEFAULT_SHIELD_FRESH_SECS,
                DEFAULT_SHIELD_SWR_SECS,
                DEFAULT_SHIELD_SIE_SECS,
            ),
            regional: TierPolicy::from_secs(
                DEFAULT_REGIONAL_FRESH_SECS,
                DEFAULT_REGIONAL_SWR_SECS,
                DEFAULT_REGIONAL_SIE_SECS,
            ),
            shield_capacity: DEFAULT_TIER_CAPACITY,
            regional_capacity: DEFAULT_TIER_CAPACITY,
            shield_header: DEFAULT_SHIELD_HEADER.to_string(),
            regional_header: DEFAULT_REGIONAL_HEADER.to_string(),
            tag_header: DEFAULT_TAG_HEADER.to_string(),
            internal_header_prefixes: vec![DEFAULT_INTERNAL_HEADER_PREFIX.to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            origin_timeout: Duration::from_millis(DEFAULT_ORIGIN_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let cache = &settings.cache;
        Self {
            shield: cache.shield,
            regional: cache.regional,
            shield_capacity: cache.shield_capacity.get(),
            regional_capacity: cache.regional_capacity.get(),
            shield_header: cache.shield_header.clone(),
            regional_header: cache.regional_header.clone(),
            tag_header: settings.origin.tag_header.clone(),
            internal_header_prefixes: cache.internal_header_prefixes.clone(),
            max_body_bytes: cache.max_body_bytes,
            origin_timeout: settings.origin.request_timeout,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self, tier: Tier) -> &TierPolicy {
        match tier {
            Tier::Shield => &self.shield,
            Tier::Regional => &self.regional,
        }
    }

    pub fn header_name(&self, tier: Tier) -> &str {
        match tier {
            Tier::Shield => &self.shield_header,
            Tier::Regional => &self.regional_header,
        }
    }

    /// Capacity for a tier as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self, tier: Tier) -> NonZeroUsize {
        let capacity = match tier {
            Tier::Shield => self.shield_capacity,
            Tier::Regional => self.regional_capacity,
        };
        NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.shield.fresh, Duration::from_secs(120));
        assert_eq!(
            config.shield.stale_while_revalidate,
            Duration::from_secs(31_556_952)
        );
        assert_eq!(config.regional.fresh, Duration::from_secs(3_600));
        assert_eq!(config.shield_header, "edge-cache-control");
        assert_eq!(config.tag_header, "cache-tag");
    }

    #[test]
    fn thresholds_are_strictly_ordered() {
        let policy = TierPolicy::from_secs(10, 20, 30);
        assert!(policy.is_ordered());
        assert!(policy.fresh_for() < policy.stale_serve_for());
        assert!(policy.stale_serve_for() < policy.hard_expiry_for());
        assert_eq!(policy.hard_expiry_for(), Duration::from_secs(60));
    }

    #[test]
    fn zero_window_is_not_ordered() {
        assert!(!TierPolicy::from_secs(10, 0, 30).is_ordered());
    }

    #[test]
    fn header_value_declares_shield_policy() {
        let config = CacheConfig::default();
        assert_eq!(
            config.shield.header_value(),
            "s-maxage=120, stale-while-revalidate=31556952"
        );
    }

    #[test]
    fn capacity_clamps_to_min() {
        let config = CacheConfig {
            shield_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero(Tier::Shield).get(), 1);
    }
}
