//! Cache key and tag definitions.
//!
//! A key is scoped by host class so that identical paths on different tenants
//! can never address the same entry.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::domain::tenant::{ROOT_ALIAS, TenantId};

/// Tag carried by every entry populated for shared (non-tenant) assets.
pub const SHARED_ASSETS_TAG: &str = "_assets";

/// One of the two cache layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Edge-facing, long-lived tier.
    Shield,
    /// Tier closer to origin, hour-scale freshness.
    Regional,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Shield => "shield",
            Tier::Regional => "regional",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace a request was resolved into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostClass {
    Root,
    Tenant(TenantId),
    /// Assets served from the shared origin regardless of host.
    Shared,
}

impl HostClass {
    /// Tag identifying the owner of every entry in this namespace.
    pub fn owner_tag(&self) -> &str {
        match self {
            HostClass::Root => ROOT_ALIAS,
            HostClass::Tenant(id) => id.as_str(),
            HostClass::Shared => SHARED_ASSETS_TAG,
        }
    }
}

impl fmt::Display for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostClass::Root => f.write_str("root"),
            HostClass::Tenant(id) => write!(f, "tenant:{id}"),
            HostClass::Shared => f.write_str("shared"),
        }
    }
}

/// Tier-independent cache key: host class plus resolved path (with query).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub host: HostClass,
    pub path: String,
}

impl CacheKey {
    pub fn new(host: HostClass, path: impl Into<String>) -> Self {
        Self {
            host,
            path: path.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.host, self.path)
    }
}

/// Ordered, de-duplicated set of invalidation tags.
pub type TagSet = BTreeSet<String>;

/// Build the tag set for an entry: the owner tag plus any content tags.
pub fn entry_tags<I, S>(host: &HostClass, content_tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: TagSet = content_tags
        .into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.insert(host.owner_tag().to_string());
    tags
}
