//! Tag repository
//!
//! Database operations for the read-only tag catalog.

use crate::db::DbPool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, name: &str, color: &str, slug: &str) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Of the given ids, return the ones that exist in the catalog
    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DbPool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, name: &str, color: &str, slug: &str) -> Result<Tag> {
        let result = sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?, ?, ?)")
            .bind(name)
            .bind(color)
            .bind(slug)
            .execute(&self.pool)
            .await
            .context("Failed to create tag")?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, color, slug FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get tag by ID")?;

        Ok(row.map(|row| row_to_tag(&row)))
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name, color, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tags")?;

        Ok(rows.iter().map(row_to_tag).collect())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("SELECT id FROM tags WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to check tag ids")?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

fn row_to_tag(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        color: row.get("color"),
        slug: row.get("slug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxTagRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxTagRepository::new(pool)
    }

    #[tokio::test]
    async fn test_seeded_tags_listed_by_name() {
        let repo = setup_test_repo().await;

        let tags = repo.list().await.expect("Failed to list tags");

        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, "Breakfast");
        assert_eq!(tags[1].name, "Dinner");
        assert_eq!(tags[2].name, "Lunch");
    }

    #[tokio::test]
    async fn test_create_and_get_tag() {
        let repo = setup_test_repo().await;

        let created = repo
            .create("Dessert", "#FFB6C1", "dessert")
            .await
            .expect("Failed to create tag");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get tag")
            .expect("Tag not found");
        assert_eq!(found.slug, "dessert");
    }

    #[tokio::test]
    async fn test_get_tag_by_id_not_found() {
        let repo = setup_test_repo().await;

        let found = repo.get_by_id(99999).await.expect("Failed to get tag");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let repo = setup_test_repo().await;

        let result = repo.create("Second Breakfast", "#AAAAAA", "breakfast").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_existing_ids_filters_unknown() {
        let repo = setup_test_repo().await;
        let tags = repo.list().await.expect("list");

        let known: Vec<i64> = tags.iter().map(|t| t.id).collect();
        let mut queried = known.clone();
        queried.push(99999);

        let mut existing = repo.existing_ids(&queried).await.expect("existing_ids");
        existing.sort_unstable();
        let mut expected = known;
        expected.sort_unstable();
        assert_eq!(existing, expected);
    }

    #[tokio::test]
    async fn test_existing_ids_empty_input() {
        let repo = setup_test_repo().await;
        let existing = repo.existing_ids(&[]).await.expect("existing_ids");
        assert!(existing.is_empty());
    }
}
