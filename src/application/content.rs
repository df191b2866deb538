//! Read-only queries over the content store.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::repos::ContentStore;
use crate::domain::content::{AuthorRecord, Post};

pub const DEFAULT_POST_LIMIT: usize = 5;

/// Filters accepted by the post listing. `tag` wins over `author`.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub tag: Option<String>,
    pub author: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn posts(&self, query: PostQuery) -> Result<Vec<Post>, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_POST_LIMIT);
        let posts = match (query.tag.as_deref(), query.author) {
            (Some(tag), _) => self.store.get_by_tag(tag).await?,
            (None, Some(author)) => self.store.get_by_author(author).await?,
            (None, None) => return Ok(self.store.get_recent(limit).await?),
        };
        Ok(posts.into_iter().take(limit).collect())
    }

    pub async fn post(&self, id: u64) -> Result<Option<Post>, AppError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn authors(&self) -> Result<Vec<AuthorRecord>, AppError> {
        Ok(self.store.authors().await?)
    }
}
