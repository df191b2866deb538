//! Tenant lifecycle: registration rules and deletion with a cache sweep.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::repos::TenantRegistry;
use crate::cache::{InvalidationCoordinator, InvalidationResult};
use crate::domain::error::DomainError;
use crate::domain::tenant::{Tenant, TenantIcon, TenantId};

/// Outcome of deleting a tenant. The tenant is gone even when the sweep
/// failed; the failed stage stays pending in the invalidation ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDeletion {
    pub id: TenantId,
    pub invalidation: InvalidationResult,
}

#[derive(Clone)]
pub struct TenantService {
    registry: Arc<dyn TenantRegistry>,
    invalidation: Arc<InvalidationCoordinator>,
}

impl TenantService {
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        invalidation: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            registry,
            invalidation,
        }
    }

    /// Register a tenant. The id is validated exactly as supplied.
    pub async fn register(&self, id: &str, icon: &str) -> Result<Tenant, AppError> {
        let id = TenantId::parse(id)?;
        if id.is_reserved() {
            return Err(DomainError::validation(format!("tenant id `{id}` is reserved")).into());
        }
        let icon = TenantIcon::parse(icon)?;

        let tenant = self.registry.put(id, icon).await?;
        info!(tenant = %tenant.id, "Tenant registered");
        Ok(tenant)
    }

    /// Remove a tenant and sweep every cached entry tagged with its id.
    pub async fn delete(&self, id: &str) -> Result<TenantDeletion, AppError> {
        let id = TenantId::parse(id)?;
        if !self.registry.delete(&id).await? {
            return Err(DomainError::not_found("tenant").into());
        }

        let invalidation = self.invalidation.invalidate(id.as_str()).await?;
        if invalidation.success {
            info!(tenant = %id, "Tenant deleted and swept");
        } else {
            warn!(
                tenant = %id,
                failed_tier = ?invalidation.failed_tier,
                "Tenant deleted; cache sweep left pending"
            );
        }
        Ok(TenantDeletion { id, invalidation })
    }

    pub async fn get(&self, id: &str) -> Result<Tenant, AppError> {
        let id = TenantId::parse(id)?;
        self.find(&id)
            .await?
            .ok_or_else(|| DomainError::not_found("tenant").into())
    }

    pub async fn find(&self, id: &TenantId) -> Result<Option<Tenant>, AppError> {
        Ok(self.registry.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        Ok(self.registry.get_all().await?)
    }
}
