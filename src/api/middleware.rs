//! API middleware
//!
//! Shared HTTP plumbing:
//! - `AppState` with the service handles
//! - the `ApiError` JSON envelope and its status mapping
//! - bearer-token authentication middleware (required and optional)
//! - extractors for the authenticated user and the optional viewer

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::User;
use crate::services::{
    IngredientService, RecipeService, RecipeServiceError, TagService, UserService,
    UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub recipe_service: Arc<RecipeService>,
    pub tag_service: Arc<TagService>,
    pub ingredient_service: Arc<IngredientService>,
    /// Default page size for list endpoints
    pub page_size: u32,
}

/// Authenticated user extracted from request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The optional viewer identity for endpoints readable anonymously
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    /// Viewer id for viewer-relative queries, if authenticated
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Payload references an id that does not exist (400, not 404: the URL
    /// itself is fine)
    pub fn bad_reference(message: impl Into<String>) -> Self {
        Self::new("BAD_REFERENCE", message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new("ALREADY_EXISTS", message)
    }

    pub fn not_in_list(message: impl Into<String>) -> Self {
        Self::new("NOT_IN_LIST", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "BAD_REFERENCE" | "ALREADY_EXISTS" | "NOT_IN_LIST"
            | "SELF_FOLLOW" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match &err {
            UserServiceError::Validation(_) => ApiError::validation_error(err.to_string()),
            UserServiceError::UserExists(_) => ApiError::already_exists(err.to_string()),
            UserServiceError::AuthenticationFailed => ApiError::unauthorized(err.to_string()),
            UserServiceError::UserNotFound(_) => ApiError::not_found(err.to_string()),
            UserServiceError::SelfFollow => ApiError::new("SELF_FOLLOW", err.to_string()),
            UserServiceError::AlreadyFollowing(_) => ApiError::already_exists(err.to_string()),
            UserServiceError::NotFollowing(_) => ApiError::not_in_list(err.to_string()),
            UserServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<RecipeServiceError> for ApiError {
    fn from(err: RecipeServiceError) -> Self {
        match &err {
            RecipeServiceError::Validation(_) => ApiError::validation_error(err.to_string()),
            RecipeServiceError::RecipeNotFound(_) => ApiError::not_found(err.to_string()),
            RecipeServiceError::TagNotFound(_) | RecipeServiceError::IngredientNotFound(_) => {
                ApiError::bad_reference(err.to_string())
            }
            RecipeServiceError::AlreadyExists(_) => ApiError::already_exists(err.to_string()),
            RecipeServiceError::NotInList(_) => ApiError::not_in_list(err.to_string()),
            RecipeServiceError::PermissionDenied => ApiError::forbidden(err.to_string()),
            RecipeServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the bearer token from the Authorization header.
///
/// Both `Bearer <token>` and `Token <token>` are accepted; older clients of
/// the original API send the latter.
pub fn request_token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let auth_header = headers.get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .or_else(|| auth_str.strip_prefix("Token "))
        .map(|token| token.to_string())
}

/// Extract the bearer token from a request
pub fn request_token(request: &Request) -> Option<String> {
    request_token_from_headers(request.headers())
}

/// Session resolution middleware, applied to the whole API.
///
/// Attaches the user when a valid token is present and passes the request
/// through otherwise; `require_auth` downstream turns absence into a 401.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request_token(&request) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session validation failed: {:#}", e),
        }
    }
    next.run(request).await
}

/// Authentication middleware for protected routes.
///
/// Relies on `resolve_session` having run further out in the stack.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Err(ApiError::unauthorized("Authentication required"));
    }
    Ok(next.run(request).await)
}
