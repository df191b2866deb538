//! Wiring of settings and collaborators into the two listener states.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::application::content::ContentService;
use crate::application::repos::{ContentStore, TenantRegistry};
use crate::application::tenants::TenantService;
use crate::cache::{
    CacheConfig, InvalidationCoordinator, InvalidationTarget, MemoryTierStore, Origin, Tier,
    TieredCache,
};
use crate::config::Settings;
use crate::routing::{RequestRouter, SubdomainResolver};

use super::content::JsonContentStore;
use super::error::InfraError;
use super::http::{EdgeState, InternalState};
use super::origin::{HttpOrigin, HttpOriginPurge};
use super::tenants::MemoryTenantRegistry;

/// External systems the edge talks to.
pub struct Collaborators {
    pub origin: Arc<dyn Origin>,
    pub origin_purge: Arc<dyn InvalidationTarget>,
    pub registry: Arc<dyn TenantRegistry>,
    pub content: Arc<dyn ContentStore>,
}

impl Collaborators {
    /// HTTP origin adapters, the seeded in-memory registry and the configured content file.
    pub async fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let content = match settings.content.data_file.as_deref() {
            Some(path) => JsonContentStore::load(path).await?,
            None => JsonContentStore::empty(),
        };
        Ok(Self {
            origin: Arc::new(HttpOrigin::new(&settings.origin)?),
            origin_purge: Arc::new(HttpOriginPurge::new(&settings.origin)?),
            registry: Arc::new(MemoryTenantRegistry::seeded(&settings.tenants.seed)),
            content: Arc::new(content),
        })
    }
}

#[derive(Clone)]
pub struct ApplicationContext {
    pub cache: TieredCache,
    pub regional: Arc<MemoryTierStore>,
    pub shield: Arc<MemoryTierStore>,
    pub invalidation: Arc<InvalidationCoordinator>,
    pub tenants: TenantService,
    pub content: ContentService,
    pub edge: EdgeState,
    pub internal: InternalState,
}

impl ApplicationContext {
    pub fn build(settings: &Settings, collaborators: Collaborators) -> Self {
        let cache_config = CacheConfig::from(settings);
        let regional = Arc::new(MemoryTierStore::new(Tier::Regional, &cache_config));
        let shield = Arc::new(MemoryTierStore::new(Tier::Shield, &cache_config));
        let cache = TieredCache::new(
            cache_config,
            regional.clone(),
            shield.clone(),
            collaborators.origin,
        );

        let invalidation = Arc::new(
            InvalidationCoordinator::new(
                collaborators.origin_purge,
                regional.clone(),
                shield.clone(),
            )
            .with_stage_timeout(settings.invalidation.stage_timeout),
        );

        let tenants = TenantService::new(collaborators.registry, invalidation.clone());
        let content = ContentService::new(collaborators.content);

        let routing = &settings.routing;
        let resolver = Arc::new(SubdomainResolver::new(
            &routing.root_domain,
            routing.preview_domain.as_deref(),
        ));
        let router = Arc::new(RequestRouter::new(
            &routing.tenant_namespace,
            &routing.admin_prefix,
            routing.asset_prefixes.clone(),
        ));
        let admin_redirect: Arc<str> =
            format!("{}{}", routing.root_url(), routing.admin_prefix).into();

        let edge = EdgeState {
            resolver: resolver.clone(),
            router,
            cache: cache.clone(),
            tenants: tenants.clone(),
            admin_redirect,
            trust_forwarded_host: routing.trust_forwarded_host,
        };
        let internal = InternalState {
            invalidation: invalidation.clone(),
            tenants: tenants.clone(),
            content: content.clone(),
            resolver,
            trust_forwarded_host: routing.trust_forwarded_host,
        };

        Self {
            cache,
            regional,
            shield,
            invalidation,
            tenants,
            content,
            edge,
            internal,
        }
    }

    /// Re-drive pending invalidations every `interval`.
    pub fn spawn_invalidation_retry(&self, interval: Duration) -> JoinHandle<()> {
        let invalidation = self.invalidation.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if invalidation.ledger().is_empty() {
                    continue;
                }
                let results = invalidation.retry_pending().await;
                let completed = results.iter().filter(|result| result.success).count();
                info!(
                    attempted = results.len(),
                    completed,
                    "Retried pending invalidations"
                );
            }
        })
    }
}
