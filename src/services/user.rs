//! User service
//!
//! Business logic for accounts and the follow relation:
//! - registration with username rules (reserved names, charset)
//! - login/logout over server-side bearer sessions
//! - subscribe/unsubscribe with self-follow rejection
//! - viewer-relative profile reads (`is_subscribed`)

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, ListParams, PagedResult, Session, User, UserProfile};
use crate::services::password::{hash_password, verify_password};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Usernames that can never be registered; `me` collides with the
/// `/api/users/me` route
const RESERVED_USERNAMES: &[&str] = &["me"];

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error (invalid input)
    #[error("{0}")]
    Validation(String),

    /// Username or email already taken
    #[error("{0}")]
    UserExists(String),

    /// Invalid credentials on login
    #[error("Invalid email or password")]
    AuthenticationFailed,

    /// Referenced user does not exist
    #[error("User with id = {0} not found")]
    UserNotFound(i64),

    /// Attempt to follow oneself
    #[error("Subscribing to yourself is not allowed")]
    SelfFollow,

    /// Follow already present on subscribe
    #[error("Already subscribed to user with id = {0}")]
    AlreadyFollowing(i64),

    /// Follow absent on unsubscribe
    #[error("Not subscribed to user with id = {0}")]
    NotFollowing(i64),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// User service for accounts, sessions and follows
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Register a new user.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = User::new(
            input.username,
            input.email,
            input.first_name,
            input.last_name,
            password_hash,
        );

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        Ok(created)
    }

    fn validate_register_input(&self, input: &CreateUserInput) -> Result<(), UserServiceError> {
        if input.email.trim().is_empty() || !input.email.contains('@') {
            return Err(UserServiceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if input.username.trim().is_empty() {
            return Err(UserServiceError::Validation(
                "Username must not be empty".to_string(),
            ));
        }
        if input.username.len() > 150 {
            return Err(UserServiceError::Validation(
                "Username must be at most 150 characters".to_string(),
            ));
        }
        if RESERVED_USERNAMES.contains(&input.username.as_str()) {
            return Err(UserServiceError::Validation(format!(
                "Username '{}' is not available",
                input.username
            )));
        }
        if !USERNAME_RE.is_match(&input.username) {
            return Err(UserServiceError::Validation(
                "Username may contain only latin letters, digits and underscores".to_string(),
            ));
        }
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(UserServiceError::Validation(
                "First and last name are required".to_string(),
            ));
        }
        if input.password.len() < 8 {
            return Err(UserServiceError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Authenticate by email/password and open a session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, Session), UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to look up user")?
            .ok_or(UserServiceError::AuthenticationFailed)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationFailed);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    /// Close a session; returns whether a session existed.
    pub async fn logout(&self, token: &str) -> Result<bool, UserServiceError> {
        Ok(self
            .session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?)
    }

    /// Resolve a bearer token to its user.
    ///
    /// Expired sessions are pruned on sight and treated as absent.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>> {
        let Some(session) = self
            .session_repo
            .get(token)
            .await
            .context("Failed to look up session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to prune expired session")?;
            return Ok(None);
        }

        self.user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to load session user")
    }

    /// Get one user as seen by the viewer.
    pub async fn get_profile(
        &self,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<UserProfile, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to load user")?
            .ok_or(UserServiceError::UserNotFound(id))?;

        let is_subscribed = self.subscription_flag(viewer, id).await?;

        Ok(UserProfile {
            user,
            is_subscribed,
        })
    }

    /// List users with viewer-relative subscription flags.
    pub async fn list_profiles(
        &self,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<UserProfile>, UserServiceError> {
        let page = self
            .user_repo
            .list(params)
            .await
            .context("Failed to list users")?;

        self.attach_flags(page, viewer).await
    }

    /// Subscribe the acting user to an author.
    ///
    /// The self-follow check runs before any relation existence check.
    pub async fn subscribe(
        &self,
        user: &User,
        author_id: i64,
    ) -> Result<UserProfile, UserServiceError> {
        let author = self
            .user_repo
            .get_by_id(author_id)
            .await
            .context("Failed to load author")?
            .ok_or(UserServiceError::UserNotFound(author_id))?;

        if user.id == author_id {
            return Err(UserServiceError::SelfFollow);
        }

        let inserted = self
            .user_repo
            .follow(user.id, author_id)
            .await
            .context("Failed to create follow")?;
        if !inserted {
            return Err(UserServiceError::AlreadyFollowing(author_id));
        }

        Ok(UserProfile {
            user: author,
            is_subscribed: Some(true),
        })
    }

    /// Remove the acting user's subscription to an author.
    pub async fn unsubscribe(&self, user: &User, author_id: i64) -> Result<(), UserServiceError> {
        if self
            .user_repo
            .get_by_id(author_id)
            .await
            .context("Failed to load author")?
            .is_none()
        {
            return Err(UserServiceError::UserNotFound(author_id));
        }

        if user.id == author_id {
            return Err(UserServiceError::SelfFollow);
        }

        let removed = self
            .user_repo
            .unfollow(user.id, author_id)
            .await
            .context("Failed to delete follow")?;
        if !removed {
            return Err(UserServiceError::NotFollowing(author_id));
        }

        Ok(())
    }

    /// Authors the acting user follows; every row is subscribed by
    /// definition.
    pub async fn subscriptions(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<UserProfile>, UserServiceError> {
        let page = self
            .user_repo
            .list_followed_authors(user.id, params)
            .await
            .context("Failed to list subscriptions")?;

        Ok(page.map(|author| UserProfile {
            user: author,
            is_subscribed: Some(true),
        }))
    }

    /// Viewer-relative subscription flag: `None` for anonymous viewers.
    pub async fn subscription_flag(
        &self,
        viewer: Option<i64>,
        target: i64,
    ) -> Result<Option<bool>, UserServiceError> {
        match viewer {
            None => Ok(None),
            Some(viewer_id) => Ok(Some(
                self.user_repo
                    .is_following(viewer_id, target)
                    .await
                    .context("Failed to check follow")?,
            )),
        }
    }

    async fn attach_flags(
        &self,
        page: PagedResult<User>,
        viewer: Option<i64>,
    ) -> Result<PagedResult<UserProfile>, UserServiceError> {
        let mut profiles = Vec::with_capacity(page.items.len());
        for user in &page.items {
            let is_subscribed = self.subscription_flag(viewer, user.id).await?;
            profiles.push(UserProfile {
                user: user.clone(),
                is_subscribed,
            });
        }

        Ok(PagedResult {
            items: profiles,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> UserService {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: "super-secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = setup().await;

        let user = service.register(input("alice")).await.expect("register");

        assert!(user.id > 0);
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_rejects_reserved_username() {
        let service = setup().await;

        let result = service.register(input("me")).await;

        assert!(matches!(result, Err(UserServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_charset() {
        let service = setup().await;
        let mut bad = input("alice");
        bad.username = "ali-ce!".to_string();

        let result = service.register(bad).await;

        assert!(matches!(result, Err(UserServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let service = setup().await;
        let mut bad = input("alice");
        bad.password = "short".to_string();

        let result = service.register(bad).await;

        assert!(matches!(result, Err(UserServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let service = setup().await;
        service.register(input("alice")).await.expect("register");

        let mut dup = input("alice");
        dup.email = "other@example.com".to_string();
        let result = service.register(dup).await;

        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_and_session_roundtrip() {
        let service = setup().await;
        service.register(input("alice")).await.expect("register");

        let (user, session) = service
            .login("alice@example.com", "super-secret")
            .await
            .expect("login");

        let resolved = service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .expect("session should resolve");
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = setup().await;
        service.register(input("alice")).await.expect("register");

        let result = service.login("alice@example.com", "wrong-password").await;

        assert!(matches!(result, Err(UserServiceError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup().await;
        service.register(input("alice")).await.expect("register");
        let (_, session) = service
            .login("alice@example.com", "super-secret")
            .await
            .expect("login");

        assert!(service.logout(&session.id).await.expect("logout"));
        assert!(service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .is_none());
    }

    #[tokio::test]
    async fn test_subscribe_flow() {
        let service = setup().await;
        let alice = service.register(input("alice")).await.expect("register");
        let bob = service.register(input("bob")).await.expect("register");

        let profile = service.subscribe(&alice, bob.id).await.expect("subscribe");
        assert_eq!(profile.user.id, bob.id);
        assert_eq!(profile.is_subscribed, Some(true));

        // Second subscribe conflicts
        let result = service.subscribe(&alice, bob.id).await;
        assert!(matches!(result, Err(UserServiceError::AlreadyFollowing(_))));

        service.unsubscribe(&alice, bob.id).await.expect("unsubscribe");
        let result = service.unsubscribe(&alice, bob.id).await;
        assert!(matches!(result, Err(UserServiceError::NotFollowing(_))));
    }

    #[tokio::test]
    async fn test_self_follow_rejected_regardless_of_state() {
        let service = setup().await;
        let alice = service.register(input("alice")).await.expect("register");

        let result = service.subscribe(&alice, alice.id).await;
        assert!(matches!(result, Err(UserServiceError::SelfFollow)));

        let result = service.unsubscribe(&alice, alice.id).await;
        assert!(matches!(result, Err(UserServiceError::SelfFollow)));
    }

    #[tokio::test]
    async fn test_subscribe_unknown_author() {
        let service = setup().await;
        let alice = service.register(input("alice")).await.expect("register");

        let result = service.subscribe(&alice, 99999).await;

        assert!(matches!(result, Err(UserServiceError::UserNotFound(99999))));
    }

    #[tokio::test]
    async fn test_profile_flags_follow_viewer() {
        let service = setup().await;
        let alice = service.register(input("alice")).await.expect("register");
        let bob = service.register(input("bob")).await.expect("register");
        service.subscribe(&alice, bob.id).await.expect("subscribe");

        // Anonymous viewer: flag not applicable
        let anon = service.get_profile(bob.id, None).await.expect("profile");
        assert_eq!(anon.is_subscribed, None);

        let seen_by_alice = service
            .get_profile(bob.id, Some(alice.id))
            .await
            .expect("profile");
        assert_eq!(seen_by_alice.is_subscribed, Some(true));

        let seen_by_bob = service
            .get_profile(alice.id, Some(bob.id))
            .await
            .expect("profile");
        assert_eq!(seen_by_bob.is_subscribed, Some(false));
    }

    #[tokio::test]
    async fn test_subscriptions_listing() {
        let service = setup().await;
        let alice = service.register(input("alice")).await.expect("register");
        let bob = service.register(input("bob")).await.expect("register");
        let carol = service.register(input("carol")).await.expect("register");
        service.subscribe(&alice, bob.id).await.expect("subscribe");
        service.subscribe(&alice, carol.id).await.expect("subscribe");

        let page = service
            .subscriptions(&alice, &ListParams::default())
            .await
            .expect("subscriptions");

        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|p| p.is_subscribed == Some(true)));
    }
}
