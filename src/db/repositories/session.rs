//! Session repository
//!
//! Storage for bearer-token sessions.

use crate::db::DbPool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session
    async fn create(&self, session: &Session) -> Result<()>;

    /// Get a session by token
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session; returns whether a row was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Remove every expired session, returning the number pruned
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DbPool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create session")?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get session")?;

        Ok(row.map(|row| Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup() -> (DbPool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        (pool.clone(), SqlxSessionRepository::new(pool))
    }

    async fn create_test_user(pool: &DbPool) -> i64 {
        let result = sqlx::query(
            r#"INSERT INTO users (username, email, first_name, last_name, password_hash)
               VALUES ('cook', 'cook@example.com', 'Test', 'Cook', 'hash')"#,
        )
        .execute(pool)
        .await
        .expect("Failed to create test user");
        result.last_insert_rowid()
    }

    fn session_for(user_id: i64, token: &str, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: token.to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (pool, repo) = setup().await;
        let user_id = create_test_user(&pool).await;

        let session = session_for(user_id, "token-1", Duration::days(7));
        repo.create(&session).await.expect("create");

        let found = repo.get("token-1").await.expect("get").expect("missing");
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let (_pool, repo) = setup().await;
        assert!(repo.get("nope").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (pool, repo) = setup().await;
        let user_id = create_test_user(&pool).await;
        repo.create(&session_for(user_id, "token-2", Duration::days(1)))
            .await
            .expect("create");

        assert!(repo.delete("token-2").await.expect("delete"));
        assert!(!repo.delete("token-2").await.expect("second delete"));
    }

    #[tokio::test]
    async fn test_delete_expired_prunes_only_stale_rows() {
        let (pool, repo) = setup().await;
        let user_id = create_test_user(&pool).await;
        repo.create(&session_for(user_id, "fresh", Duration::days(1)))
            .await
            .expect("create");
        repo.create(&session_for(user_id, "stale", Duration::days(-1)))
            .await
            .expect("create");

        let pruned = repo.delete_expired().await.expect("prune");

        assert_eq!(pruned, 1);
        assert!(repo.get("fresh").await.expect("get").is_some());
        assert!(repo.get("stale").await.expect("get").is_none());
    }
}
