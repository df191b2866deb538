//! JSON-file content store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::application::repos::{ContentStore, RepoError};
use crate::domain::content::{AuthorRecord, Post, PostRecord};

use super::error::InfraError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentFile {
    posts: Vec<PostRecord>,
    authors: Vec<AuthorRecord>,
}

/// Posts and authors loaded once at startup and served from memory.
#[derive(Debug, Default, Clone)]
pub struct JsonContentStore {
    data: Arc<ContentFile>,
}

impl JsonContentStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, InfraError> {
        let data: ContentFile = serde_json::from_slice(bytes)
            .map_err(|err| InfraError::configuration(format!("invalid content data: {err}")))?;
        Ok(Self {
            data: Arc::new(data),
        })
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let bytes = tokio::fs::read(path).await?;
        let store = Self::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            posts = store.data.posts.len(),
            authors = store.data.authors.len(),
            "Loaded content data"
        );
        Ok(store)
    }

    fn resolve<'a>(&self, records: impl Iterator<Item = &'a PostRecord>) -> Vec<Post> {
        records
            .map(|record| Post::from_record(record, &self.data.authors))
            .collect()
    }
}

#[async_trait]
impl ContentStore for JsonContentStore {
    async fn get_by_id(&self, id: u64) -> Result<Option<Post>, RepoError> {
        Ok(self
            .data
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|record| Post::from_record(record, &self.data.authors)))
    }

    async fn get_by_tag(&self, tag: &str) -> Result<Vec<Post>, RepoError> {
        Ok(self.resolve(
            self.data
                .posts
                .iter()
                .filter(|post| post.tags.iter().any(|candidate| candidate == tag)),
        ))
    }

    async fn get_by_author(&self, author_id: u64) -> Result<Vec<Post>, RepoError> {
        Ok(self.resolve(
            self.data
                .posts
                .iter()
                .filter(|post| post.author == author_id),
        ))
    }

    /// Newest first by publication timestamp; ties keep file order.
    async fn get_recent(&self, limit: usize) -> Result<Vec<Post>, RepoError> {
        let mut records: Vec<&PostRecord> = self.data.posts.iter().collect();
        records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(self.resolve(records.into_iter().take(limit)))
    }

    async fn authors(&self) -> Result<Vec<AuthorRecord>, RepoError> {
        Ok(self.data.authors.clone())
    }
}
