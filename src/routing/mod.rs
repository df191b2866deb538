//! Subdomain resolution and request routing.

mod resolver;
mod router;

pub use resolver::SubdomainResolver;
pub use router::{
    DEFAULT_ADMIN_PREFIX, DEFAULT_ASSET_PREFIX, DEFAULT_TENANT_NAMESPACE, FetchMode, RequestRouter,
    RouteDecision,
};
