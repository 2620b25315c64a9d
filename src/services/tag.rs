//! Tag service
//!
//! Read-only access to the tag catalog, with the full list cached.

use std::sync::Arc;

use anyhow::Result;

use crate::cache::MemoryCache;
use crate::db::repositories::TagRepository;
use crate::models::Tag;

const CACHE_KEY_ALL: &str = "tags:all";

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<MemoryCache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// List all tags, name order
    pub async fn list(&self) -> Result<Vec<Tag>> {
        if let Some(cached) = self.cache.get::<Vec<Tag>>(CACHE_KEY_ALL).await? {
            return Ok(cached);
        }

        let tags = self.repo.list().await?;
        self.cache.set(CACHE_KEY_ALL, &tags).await?;
        Ok(tags)
    }

    /// Get one tag by id
    pub async fn get(&self, id: i64) -> Result<Option<Tag>> {
        self.repo.get_by_id(id).await
    }
}
