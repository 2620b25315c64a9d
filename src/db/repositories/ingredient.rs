//! Ingredient repository
//!
//! Database operations for the ingredient catalog, including the
//! case-insensitive prefix search backing the lookup endpoint.

use crate::db::DbPool;
use crate::models::Ingredient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row};
use std::sync::Arc;

/// Ingredient repository trait
#[async_trait]
pub trait IngredientRepository: Send + Sync {
    /// Create a new ingredient
    async fn create(&self, name: &str, measurement_unit: &str) -> Result<Ingredient>;

    /// Get ingredient by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>>;

    /// List ingredients, optionally narrowed to a name prefix
    async fn list(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>>;

    /// Of the given ids, return the ones that exist in the catalog
    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

/// SQLx-based ingredient repository implementation
pub struct SqlxIngredientRepository {
    pool: DbPool,
}

impl SqlxIngredientRepository {
    /// Create a new SQLx ingredient repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn IngredientRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl IngredientRepository for SqlxIngredientRepository {
    async fn create(&self, name: &str, measurement_unit: &str) -> Result<Ingredient> {
        let result =
            sqlx::query("INSERT INTO ingredients (name, measurement_unit) VALUES (?, ?)")
                .bind(name)
                .bind(measurement_unit)
                .execute(&self.pool)
                .await
                .context("Failed to create ingredient")?;

        Ok(Ingredient {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>> {
        let row =
            sqlx::query("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to get ingredient by ID")?;

        Ok(row.map(|row| row_to_ingredient(&row)))
    }

    async fn list(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let rows = match name_prefix {
            Some(prefix) => {
                // LIKE is case-insensitive for ASCII in SQLite; escape the
                // wildcard characters so the prefix is matched literally
                let pattern = format!("{}%", escape_like(prefix));
                sqlx::query(
                    r#"
                    SELECT id, name, measurement_unit
                    FROM ingredients
                    WHERE name LIKE ? ESCAPE '\'
                    ORDER BY name
                    "#,
                )
                .bind(pattern)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, name, measurement_unit FROM ingredients ORDER BY name",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list ingredients")?;

        Ok(rows.iter().map(row_to_ingredient).collect())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("SELECT id FROM ingredients WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to check ingredient ids")?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

fn row_to_ingredient(row: &sqlx::sqlite::SqliteRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxIngredientRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxIngredientRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_ingredient() {
        let repo = setup_test_repo().await;

        let created = repo.create("flour", "g").await.expect("create");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("get")
            .expect("ingredient not found");
        assert_eq!(found.name, "flour");
        assert_eq!(found.measurement_unit, "g");
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let repo = setup_test_repo().await;
        repo.create("salt", "g").await.expect("create");
        repo.create("butter", "g").await.expect("create");
        repo.create("milk", "ml").await.expect("create");

        let all = repo.list(None).await.expect("list");

        let names: Vec<&str> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["butter", "milk", "salt"]);
    }

    #[tokio::test]
    async fn test_prefix_search() {
        let repo = setup_test_repo().await;
        repo.create("sugar", "g").await.expect("create");
        repo.create("sunflower oil", "ml").await.expect("create");
        repo.create("salt", "g").await.expect("create");

        let hits = repo.list(Some("su")).await.expect("list");

        let names: Vec<&str> = hits.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["sugar", "sunflower oil"]);
    }

    #[tokio::test]
    async fn test_prefix_search_is_case_insensitive() {
        let repo = setup_test_repo().await;
        repo.create("Sugar", "g").await.expect("create");

        let hits = repo.list(Some("su")).await.expect("list");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Sugar");
    }

    #[tokio::test]
    async fn test_prefix_search_escapes_wildcards() {
        let repo = setup_test_repo().await;
        repo.create("100% cocoa", "g").await.expect("create");
        repo.create("cocoa", "g").await.expect("create");

        let hits = repo.list(Some("100%")).await.expect("list");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100% cocoa");
    }

    #[tokio::test]
    async fn test_prefix_match_is_anchored() {
        let repo = setup_test_repo().await;
        repo.create("brown sugar", "g").await.expect("create");
        repo.create("sugar", "g").await.expect("create");

        let hits = repo.list(Some("sugar")).await.expect("list");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "sugar");
    }
}
