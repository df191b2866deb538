//! In-process tenant registry.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use time::OffsetDateTime;

use crate::application::repos::{RepoError, TenantRegistry};
use crate::config::SeedTenant;
use crate::domain::tenant::{Tenant, TenantIcon, TenantId};

const TENANT_ID_CONSTRAINT: &str = "tenants_id_key";

#[derive(Default, Clone)]
pub struct MemoryTenantRegistry {
    tenants: Arc<DashMap<TenantId, Tenant>>,
}

impl MemoryTenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with configured tenants, stamped with the current time.
    pub fn seeded(seed: &[SeedTenant]) -> Self {
        let registry = Self::new();
        let now = OffsetDateTime::now_utc();
        for tenant in seed {
            registry.tenants.insert(
                tenant.id.clone(),
                Tenant::new(tenant.id.clone(), tenant.icon.clone(), now),
            );
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[async_trait]
impl TenantRegistry for MemoryTenantRegistry {
    async fn get(&self, id: &TenantId) -> Result<Option<Tenant>, RepoError> {
        Ok(self.tenants.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_all(&self) -> Result<Vec<Tenant>, RepoError> {
        let mut tenants: Vec<Tenant> = self
            .tenants
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tenants)
    }

    async fn put(&self, id: TenantId, icon: TenantIcon) -> Result<Tenant, RepoError> {
        match self.tenants.entry(id) {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: TENANT_ID_CONSTRAINT.to_string(),
            }),
            Entry::Vacant(vacant) => {
                let tenant = Tenant::new(vacant.key().clone(), icon, OffsetDateTime::now_utc());
                vacant.insert(tenant.clone());
                Ok(tenant)
            }
        }
    }

    async fn delete(&self, id: &TenantId) -> Result<bool, RepoError> {
        Ok(self.tenants.remove(id).is_some())
    }
}
