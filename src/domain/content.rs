//! Blog content served by the content collaborator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: u64,
    pub name: String,
}

/// Post as persisted, referencing its author by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub author: u64,
    pub published_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Post with its author name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub published_at: String,
    pub tags: Vec<String>,
}

pub const UNKNOWN_AUTHOR: &str = "Unknown";

impl Post {
    pub fn from_record(record: &PostRecord, authors: &[AuthorRecord]) -> Self {
        let author = authors
            .iter()
            .find(|author| author.id == record.author)
            .map(|author| author.name.clone())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        Self {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            author,
            published_at: record.published_at.clone(),
            tags: record.tags.clone(),
        }
    }

    /// Cache tag identifying this post across both tiers.
    pub fn cache_tag(&self) -> String {
        format!("post:{}", self.id)
    }
}
