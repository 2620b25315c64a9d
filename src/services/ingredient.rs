//! Ingredient service
//!
//! Read-only access to the ingredient catalog with prefix search; results
//! are cached per search term.

use std::sync::Arc;

use anyhow::Result;

use crate::cache::MemoryCache;
use crate::db::repositories::IngredientRepository;
use crate::models::Ingredient;

/// Ingredient service
pub struct IngredientService {
    repo: Arc<dyn IngredientRepository>,
    cache: Arc<MemoryCache>,
}

impl IngredientService {
    pub fn new(repo: Arc<dyn IngredientRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// List ingredients, optionally narrowed to a case-insensitive name prefix
    pub async fn search(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let key = format!("ingredients:search:{}", name_prefix.unwrap_or(""));

        if let Some(cached) = self.cache.get::<Vec<Ingredient>>(&key).await? {
            return Ok(cached);
        }

        let ingredients = self.repo.list(name_prefix).await?;
        self.cache.set(&key, &ingredients).await?;
        Ok(ingredients)
    }

    /// Get one ingredient by id
    pub async fn get(&self, id: i64) -> Result<Option<Ingredient>> {
        self.repo.get_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxIngredientRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (Arc<dyn IngredientRepository>, IngredientService) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        let repo = SqlxIngredientRepository::boxed(pool);
        let service = IngredientService::new(repo.clone(), Arc::new(MemoryCache::new()));
        (repo, service)
    }

    #[tokio::test]
    async fn test_search_with_prefix() {
        let (repo, service) = setup().await;
        repo.create("sugar", "g").await.expect("create");
        repo.create("salt", "g").await.expect("create");

        let hits = service.search(Some("su")).await.expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "sugar");
    }

    #[tokio::test]
    async fn test_search_without_prefix_lists_all() {
        let (repo, service) = setup().await;
        repo.create("sugar", "g").await.expect("create");
        repo.create("salt", "g").await.expect("create");

        let all = service.search(None).await.expect("search");

        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_ingredient() {
        let (_repo, service) = setup().await;
        assert!(service.get(99999).await.expect("get").is_none());
    }
}
