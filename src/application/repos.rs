//! Collaborator traits consumed by the routing and cache core.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{AuthorRecord, Post};
use crate::domain::tenant::{Tenant, TenantIcon, TenantId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Key/value store mapping tenant ids to tenant metadata.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn get(&self, id: &TenantId) -> Result<Option<Tenant>, RepoError>;

    async fn get_all(&self) -> Result<Vec<Tenant>, RepoError>;

    /// Insert a new tenant; fails with `Duplicate` when the id is taken.
    async fn put(&self, id: TenantId, icon: TenantIcon) -> Result<Tenant, RepoError>;

    /// Remove a tenant; returns whether it existed.
    async fn delete(&self, id: &TenantId) -> Result<bool, RepoError>;
}

/// Read-only provider of posts and authors.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_by_id(&self, id: u64) -> Result<Option<Post>, RepoError>;

    async fn get_by_tag(&self, tag: &str) -> Result<Vec<Post>, RepoError>;

    async fn get_by_author(&self, author_id: u64) -> Result<Vec<Post>, RepoError>;

    async fn get_recent(&self, limit: usize) -> Result<Vec<Post>, RepoError>;

    async fn authors(&self) -> Result<Vec<AuthorRecord>, RepoError>;
}
