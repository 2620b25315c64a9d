//! User repository
//!
//! Database operations for user accounts and the follow self-relation.
//! The follow table is a plain (follower, followee) join with a composite
//! primary key; toggle semantics live in the service layer.

use crate::db::DbPool;
use crate::models::{ListParams, PagedResult, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List users ordered by id
    async fn list(&self, params: &ListParams) -> Result<PagedResult<User>>;

    /// Insert a follow row; returns false if the pair already exists
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Delete a follow row; returns false if the pair was absent
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Whether `user_id` follows `author_id`
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Authors the user follows, oldest follow first
    async fn list_followed_authors(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, created_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, first_name, last_name, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        let mut created = user.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by ID")?;

        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to get user by username")?;

        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by email")?;

        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn list(&self, params: &ListParams) -> Result<PagedResult<User>> {
        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        let total: i64 = total_row.get("total");

        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        Ok(PagedResult::new(
            rows.iter().map(row_to_user).collect(),
            total,
            params,
        ))
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(author_id)
                .execute(&self.pool)
                .await
                .context("Failed to create follow")?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete follow")?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?) AS present",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check follow")?;

        let present: i64 = row.get("present");
        Ok(present != 0)
    }

    async fn list_followed_authors(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<User>> {
        let total_row =
            sqlx::query("SELECT COUNT(*) AS total FROM follows WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count follows")?;
        let total: i64 = total_row.get("total");

        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name,
                   u.password_hash, u.created_at
            FROM users u
            INNER JOIN follows f ON f.author_id = u.id
            WHERE f.user_id = ?
            ORDER BY f.created_at, u.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list followed authors")?;

        Ok(PagedResult::new(
            rows.iter().map(row_to_user).collect(),
            total,
            params,
        ))
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str) -> User {
        User::new(
            username.to_string(),
            format!("{}@example.com", username),
            "Test".to_string(),
            "User".to_string(),
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_lookups() {
        let repo = setup().await;

        let created = repo.create(&test_user("alice")).await.expect("create");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.expect("get").unwrap();
        assert_eq!(by_id.username, "alice");

        let by_username = repo.get_by_username("alice").await.expect("get").unwrap();
        assert_eq!(by_username.id, created.id);

        let by_email = repo
            .get_by_email("alice@example.com")
            .await
            .expect("get")
            .unwrap();
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup().await;
        repo.create(&test_user("bob")).await.expect("create");

        let mut dup = test_user("bob");
        dup.email = "other@example.com".to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup().await;
        repo.create(&test_user("carol")).await.expect("create");

        let mut dup = test_user("carol2");
        dup.email = "carol@example.com".to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup().await;
        for i in 0..5 {
            repo.create(&test_user(&format!("user{}", i)))
                .await
                .expect("create");
        }

        let page = repo.list(&ListParams::new(2, 2)).await.expect("list");

        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].username, "user2");
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let repo = setup().await;
        let alice = repo.create(&test_user("alice")).await.expect("create");
        let bob = repo.create(&test_user("bob")).await.expect("create");

        assert!(repo.follow(alice.id, bob.id).await.expect("follow"));
        // Second insert hits the composite primary key
        assert!(!repo.follow(alice.id, bob.id).await.expect("follow again"));
        assert!(repo.is_following(alice.id, bob.id).await.expect("check"));
        // Follows are directional
        assert!(!repo.is_following(bob.id, alice.id).await.expect("check"));

        assert!(repo.unfollow(alice.id, bob.id).await.expect("unfollow"));
        assert!(!repo.unfollow(alice.id, bob.id).await.expect("again"));
        assert!(!repo.is_following(alice.id, bob.id).await.expect("check"));
    }

    #[tokio::test]
    async fn test_self_follow_never_inserted() {
        let repo = setup().await;
        let alice = repo.create(&test_user("alice")).await.expect("create");

        // The CHECK constraint drops the row under INSERT OR IGNORE
        assert!(!repo.follow(alice.id, alice.id).await.expect("follow"));
        assert!(!repo.is_following(alice.id, alice.id).await.expect("check"));
    }

    #[tokio::test]
    async fn test_list_followed_authors() {
        let repo = setup().await;
        let reader = repo.create(&test_user("reader")).await.expect("create");
        let chef1 = repo.create(&test_user("chef1")).await.expect("create");
        let chef2 = repo.create(&test_user("chef2")).await.expect("create");
        let _other = repo.create(&test_user("other")).await.expect("create");

        repo.follow(reader.id, chef1.id).await.expect("follow");
        repo.follow(reader.id, chef2.id).await.expect("follow");

        let page = repo
            .list_followed_authors(reader.id, &ListParams::default())
            .await
            .expect("list");

        assert_eq!(page.total, 2);
        let names: Vec<&str> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert!(names.contains(&"chef1"));
        assert!(names.contains(&"chef2"));
        assert!(!names.contains(&"other"));
    }
}
