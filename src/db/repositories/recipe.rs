//! Recipe repository
//!
//! Database operations for recipes and their relation tables: the tag and
//! ingredient join sets (written transactionally with the recipe row),
//! favorite/cart rows, and the shopping-list aggregation.
//!
//! Viewer-relative flags (`is_favorited`, `is_in_shopping_cart`) are
//! computed with correlated `EXISTS` subqueries inside the page query
//! itself, so a listing costs a constant number of queries regardless of
//! page size.

use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::{
    IngredientAmount, ListParams, PagedResult, Recipe, RecipeDetails, RecipeFilter,
    RecipeIngredient, ShoppingListItem, Tag, User,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

/// Column values for a recipe insert or full re-write, with the join sets.
#[derive(Debug, Clone)]
pub struct RecipeWrite {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    /// Stored media path; on update `None` keeps the current image
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Recipe repository trait
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Insert a recipe with its tag and ingredient joins in one transaction
    async fn create(&self, author_id: i64, write: &RecipeWrite) -> Result<i64>;

    /// Re-write a recipe: update the row and replace both join sets
    /// (delete-then-insert) in one transaction
    async fn update(&self, recipe_id: i64, write: &RecipeWrite) -> Result<()>;

    /// Delete a recipe; join rows cascade. Returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Get the bare recipe row
    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>>;

    /// Get a recipe with author, tags, ingredients and viewer flags
    async fn get_details(&self, id: i64, viewer: Option<i64>) -> Result<Option<RecipeDetails>>;

    /// List recipes newest first with filters, pagination and viewer flags
    async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<RecipeDetails>>;

    /// An author's recipes newest first, optionally capped
    async fn list_by_author(&self, author_id: i64, limit: Option<i64>) -> Result<Vec<Recipe>>;

    /// Number of recipes an author has published
    async fn count_by_author(&self, author_id: i64) -> Result<i64>;

    /// Insert a favorite row; returns false if the pair already exists
    async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Delete a favorite row; returns false if the pair was absent
    async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Insert a cart row; returns false if the pair already exists
    async fn add_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Delete a cart row; returns false if the pair was absent
    async fn remove_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Consolidated (name, unit) → total amount over the user's cart recipes
    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>>;
}

/// SQLx-based recipe repository implementation
pub struct SqlxRecipeRepository {
    pool: DbPool,
}

impl SqlxRecipeRepository {
    /// Create a new SQLx recipe repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn RecipeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RecipeRepository for SqlxRecipeRepository {
    async fn create(&self, author_id: i64, write: &RecipeWrite) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin recipe transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO recipes (author_id, name, text, cooking_time, image, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(author_id)
        .bind(&write.name)
        .bind(&write.text)
        .bind(write.cooking_time)
        .bind(&write.image)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert recipe")?;

        let recipe_id = result.last_insert_rowid();

        insert_joins(&mut tx, recipe_id, write).await?;

        tx.commit()
            .await
            .context("Failed to commit recipe transaction")?;

        Ok(recipe_id)
    }

    async fn update(&self, recipe_id: i64, write: &RecipeWrite) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin recipe transaction")?;

        match &write.image {
            Some(image) => {
                sqlx::query(
                    "UPDATE recipes SET name = ?, text = ?, cooking_time = ?, image = ? WHERE id = ?",
                )
                .bind(&write.name)
                .bind(&write.text)
                .bind(write.cooking_time)
                .bind(image)
                .bind(recipe_id)
                .execute(&mut *tx)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE recipes SET name = ?, text = ?, cooking_time = ? WHERE id = ?",
                )
                .bind(&write.name)
                .bind(&write.text)
                .bind(write.cooking_time)
                .bind(recipe_id)
                .execute(&mut *tx)
                .await
            }
        }
        .context("Failed to update recipe")?;

        // Full replacement of both join sets
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipe tags")?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipe ingredients")?;

        insert_joins(&mut tx, recipe_id, write).await?;

        tx.commit()
            .await
            .context("Failed to commit recipe transaction")?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete recipe")?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, name, text, cooking_time, image, created_at
            FROM recipes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get recipe by ID")?;

        Ok(row.map(|row| row_to_recipe(&row)))
    }

    async fn get_details(&self, id: i64, viewer: Option<i64>) -> Result<Option<RecipeDetails>> {
        let mut qb = details_query(viewer);
        qb.push(" AND r.id = ").push_bind(id);

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get recipe details")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut details = row_to_details(&row);
        let tags = load_tags(&self.pool, &[id]).await?;
        let ingredients = load_ingredients(&self.pool, &[id]).await?;
        details.tags = tags.into_iter().flat_map(|(_, tags)| tags).collect();
        details.ingredients = ingredients
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect();

        Ok(Some(details))
    }

    async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<RecipeDetails>> {
        // Count with the same filter set
        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM recipes r WHERE 1 = 1");
        push_filters(&mut count_qb, filter, viewer);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count recipes")?
            .get("total");

        let mut qb = details_query(viewer);
        push_filters(&mut qb, filter, viewer);
        qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list recipes")?;

        let mut details: Vec<RecipeDetails> = rows.iter().map(row_to_details).collect();

        // Two batch queries fill the page's join data
        let ids: Vec<i64> = details.iter().map(|d| d.recipe.id).collect();
        let mut tags = load_tags(&self.pool, &ids).await?;
        let mut ingredients = load_ingredients(&self.pool, &ids).await?;
        for item in &mut details {
            item.tags = tags.remove(&item.recipe.id).unwrap_or_default();
            item.ingredients = ingredients.remove(&item.recipe.id).unwrap_or_default();
        }

        Ok(PagedResult::new(details, total, params))
    }

    async fn list_by_author(&self, author_id: i64, limit: Option<i64>) -> Result<Vec<Recipe>> {
        let rows = sqlx::query(
            r#"
            SELECT id, author_id, name, text, cooking_time, image, created_at
            FROM recipes
            WHERE author_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(author_id)
        // LIMIT -1 means "no limit" in SQLite
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list author recipes")?;

        Ok(rows.iter().map(row_to_recipe).collect())
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM recipes WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count author recipes")?;

        Ok(row.get("total"))
    }

    async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO favorites (user_id, recipe_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await
        .context("Failed to add favorite")?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND recipe_id = ?")
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove favorite")?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO cart_items (user_id, recipe_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await
        .context("Failed to add cart item")?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND recipe_id = ?")
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove cart item")?;

        Ok(result.rows_affected() > 0)
    }

    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>> {
        let rows = sqlx::query(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount) AS total_amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id IN (SELECT recipe_id FROM cart_items WHERE user_id = ?)
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate shopping list")?;

        Ok(rows
            .iter()
            .map(|row| ShoppingListItem {
                name: row.get("name"),
                measurement_unit: row.get("measurement_unit"),
                total_amount: row.get("total_amount"),
            })
            .collect())
    }
}

async fn insert_joins(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    recipe_id: i64,
    write: &RecipeWrite,
) -> Result<()> {
    for tag_id in &write.tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .context("Failed to insert recipe tag")?;
    }

    for item in &write.ingredients {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)",
        )
        .bind(recipe_id)
        .bind(item.id)
        .bind(item.amount)
        .execute(&mut **tx)
        .await
        .context("Failed to insert recipe ingredient")?;
    }

    Ok(())
}

/// Base SELECT for recipe details: recipe columns, author columns, and the
/// two viewer flags (NULL literals for anonymous requesters).
fn details_query(viewer: Option<i64>) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.created_at,
            u.username, u.email, u.first_name, u.last_name, u.password_hash,
            u.created_at AS author_created_at"#,
    );

    match viewer {
        Some(viewer_id) => {
            qb.push(", EXISTS(SELECT 1 FROM favorites f WHERE f.user_id = ")
                .push_bind(viewer_id)
                .push(" AND f.recipe_id = r.id) AS is_favorited");
            qb.push(", EXISTS(SELECT 1 FROM cart_items c WHERE c.user_id = ")
                .push_bind(viewer_id)
                .push(" AND c.recipe_id = r.id) AS is_in_shopping_cart");
        }
        None => {
            qb.push(", NULL AS is_favorited, NULL AS is_in_shopping_cart");
        }
    }

    qb.push(" FROM recipes r INNER JOIN users u ON u.id = r.author_id WHERE 1 = 1");
    qb
}

/// Append the listing filters as WHERE clauses.
///
/// The relation filters need a viewer identity; for anonymous requesters
/// they degrade to "no filter".
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &RecipeFilter, viewer: Option<i64>) {
    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }

    for slug in &filter.tags {
        qb.push(
            " AND EXISTS(SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ",
        )
        .push_bind(slug.clone())
        .push(")");
    }

    if let Some(viewer_id) = viewer {
        if filter.favorited_only {
            qb.push(" AND EXISTS(SELECT 1 FROM favorites f2 WHERE f2.user_id = ")
                .push_bind(viewer_id)
                .push(" AND f2.recipe_id = r.id)");
        }
        if filter.in_cart_only {
            qb.push(" AND EXISTS(SELECT 1 FROM cart_items c2 WHERE c2.user_id = ")
                .push_bind(viewer_id)
                .push(" AND c2.recipe_id = r.id)");
        }
    }
}

async fn load_tags(pool: &DbPool, recipe_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
    let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
           FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id
           WHERE rt.recipe_id IN ("#,
    );
    let mut separated = qb.separated(", ");
    for id in recipe_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY t.id");

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to load recipe tags")?;

    for row in rows {
        grouped
            .entry(row.get("recipe_id"))
            .or_default()
            .push(Tag {
                id: row.get("id"),
                name: row.get("name"),
                color: row.get("color"),
                slug: row.get("slug"),
            });
    }

    Ok(grouped)
}

async fn load_ingredients(
    pool: &DbPool,
    recipe_ids: &[i64],
) -> Result<HashMap<i64, Vec<RecipeIngredient>>> {
    let mut grouped: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
           FROM recipe_ingredients ri INNER JOIN ingredients i ON i.id = ri.ingredient_id
           WHERE ri.recipe_id IN ("#,
    );
    let mut separated = qb.separated(", ");
    for id in recipe_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY i.id");

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to load recipe ingredients")?;

    for row in rows {
        grouped
            .entry(row.get("recipe_id"))
            .or_default()
            .push(RecipeIngredient {
                id: row.get("id"),
                name: row.get("name"),
                measurement_unit: row.get("measurement_unit"),
                amount: row.get("amount"),
            });
    }

    Ok(grouped)
}

fn row_to_recipe(row: &sqlx::sqlite::SqliteRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        text: row.get("text"),
        cooking_time: row.get("cooking_time"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

fn row_to_details(row: &sqlx::sqlite::SqliteRow) -> RecipeDetails {
    let is_favorited: Option<i64> = row.get("is_favorited");
    let is_in_shopping_cart: Option<i64> = row.get("is_in_shopping_cart");

    RecipeDetails {
        recipe: row_to_recipe(row),
        author: User {
            id: row.get("author_id"),
            username: row.get("username"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            password_hash: row.get("password_hash"),
            created_at: row.get("author_created_at"),
        },
        tags: Vec::new(),
        ingredients: Vec::new(),
        is_favorited: is_favorited.map(|v| v != 0),
        is_in_shopping_cart: is_in_shopping_cart.map(|v| v != 0),
    }
}
