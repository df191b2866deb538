//! Per-request routing decision.
//!
//! The decision is taken before any cache lookup and fixes the cache key
//! namespace, so a tenant path can only ever address that tenant's entries.

use axum::http::HeaderMap;

use crate::cache::{CacheKey, HostClass, OriginRequest, Upstream};
use crate::domain::tenant::TenantId;

const SEC_FETCH_MODE: &str = "sec-fetch-mode";
const PURPOSE_HEADERS: [&str; 2] = ["purpose", "sec-purpose"];

pub const DEFAULT_TENANT_NAMESPACE: &str = "/s";
pub const DEFAULT_ADMIN_PREFIX: &str = "/admin";
pub const DEFAULT_ASSET_PREFIX: &str = "/_next";

/// How the client intends to use the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Top-level page load.
    #[default]
    Navigation,
    /// Prefetches and programmatic fetches.
    NonNavigation,
}

impl FetchMode {
    /// Classify from fetch metadata. Requests without any signal are
    /// navigations.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_ascii_lowercase())
        };

        if let Some(mode) = header(SEC_FETCH_MODE)
            && mode != "navigate"
        {
            return FetchMode::NonNavigation;
        }
        if PURPOSE_HEADERS
            .iter()
            .filter_map(|name| header(name))
            .any(|purpose| purpose.starts_with("prefetch"))
        {
            return FetchMode::NonNavigation;
        }
        FetchMode::Navigation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Admin path on a tenant host. Redirect to the root host.
    RejectAdmin,
    /// `path` is already rewritten into the tenant namespace.
    RewriteToTenantNamespace { tenant: TenantId, path: String },
    PassThroughRoot(String),
    /// Shared asset, identical for every host.
    PassThroughAsset(String),
    /// Non-navigation request on a tenant host, forwarded as-is and never cached.
    PassThroughUnmodified { tenant: TenantId, path: String },
}

impl RouteDecision {
    /// Tier key for cacheable decisions.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match self {
            RouteDecision::RewriteToTenantNamespace { tenant, path } => {
                Some(CacheKey::new(HostClass::Tenant(tenant.clone()), path.clone()))
            }
            RouteDecision::PassThroughRoot(path) => Some(CacheKey::new(HostClass::Root, path.clone())),
            RouteDecision::PassThroughAsset(path) => {
                Some(CacheKey::new(HostClass::Shared, path.clone()))
            }
            RouteDecision::RejectAdmin | RouteDecision::PassThroughUnmodified { .. } => None,
        }
    }

    /// Origin request for decisions that reach origin.
    pub fn origin_request(&self) -> Option<OriginRequest> {
        match self {
            RouteDecision::RewriteToTenantNamespace { path, .. }
            | RouteDecision::PassThroughRoot(path)
            | RouteDecision::PassThroughUnmodified { path, .. } => {
                Some(OriginRequest::new(Upstream::Pages, path.clone()))
            }
            RouteDecision::PassThroughAsset(path) => {
                Some(OriginRequest::new(Upstream::Assets, path.clone()))
            }
            RouteDecision::RejectAdmin => None,
        }
    }

    /// Tenant the request was routed for, if any.
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            RouteDecision::RewriteToTenantNamespace { tenant, .. }
            | RouteDecision::PassThroughUnmodified { tenant, .. } => Some(tenant),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RouteDecision::RejectAdmin => "reject_admin",
            RouteDecision::RewriteToTenantNamespace { .. } => "rewrite",
            RouteDecision::PassThroughRoot(_) => "root",
            RouteDecision::PassThroughAsset(_) => "asset",
            RouteDecision::PassThroughUnmodified { .. } => "unmodified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRouter {
    namespace: String,
    admin_prefix: String,
    asset_prefixes: Vec<String>,
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new(
            DEFAULT_TENANT_NAMESPACE,
            DEFAULT_ADMIN_PREFIX,
            vec![DEFAULT_ASSET_PREFIX.to_string()],
        )
    }
}

impl RequestRouter {
    pub fn new(namespace: &str, admin_prefix: &str, asset_prefixes: Vec<String>) -> Self {
        Self {
            namespace: namespace.trim_end_matches('/').to_string(),
            admin_prefix: admin_prefix.to_string(),
            asset_prefixes,
        }
    }

    /// Route a navigation request. `path` may carry a query string.
    pub fn route(&self, tenant: Option<&TenantId>, path: &str) -> RouteDecision {
        self.route_request(tenant, path, FetchMode::Navigation)
    }

    pub fn route_request(
        &self,
        tenant: Option<&TenantId>,
        path: &str,
        mode: FetchMode,
    ) -> RouteDecision {
        let path = normalize_path(path);
        let path = path.as_str();
        let Some(tenant) = tenant.filter(|tenant| !tenant.is_root_alias()) else {
            return RouteDecision::PassThroughRoot(path.to_string());
        };

        if path.starts_with(&self.admin_prefix) {
            return RouteDecision::RejectAdmin;
        }
        if self
            .asset_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return RouteDecision::PassThroughAsset(path.to_string());
        }
        if mode == FetchMode::NonNavigation {
            return RouteDecision::PassThroughUnmodified {
                tenant: tenant.clone(),
                path: path.to_string(),
            };
        }
        RouteDecision::RewriteToTenantNamespace {
            tenant: tenant.clone(),
            path: self.rewrite(tenant, path),
        }
    }

    /// `/` maps to `{namespace}/{tenant}`, anything else is appended.
    fn rewrite(&self, tenant: &TenantId, path: &str) -> String {
        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, Some(query)),
            None => (path, None),
        };
        let mut rewritten = format!("{}/{}", self.namespace, tenant);
        if route != "/" {
            if !route.starts_with('/') {
                rewritten.push('/');
            }
            rewritten.push_str(route);
        }
        if let Some(query) = query {
            rewritten.push('?');
            rewritten.push_str(query);
        }
        rewritten
    }
}

/// Collapse leading slashes so a request target can never read as a
/// scheme-relative reference (`//host/...`) once it reaches the origin.
fn normalize_path(path: &str) -> String {
    let rest = path.trim_start_matches('/');
    format!("/{rest}")
}
