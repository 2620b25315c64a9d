//! Authentication API endpoints
//!
//! - POST /api/auth/register - account creation
//! - POST /api/auth/login - open a bearer session
//! - POST /api/auth/logout - close the current session

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{request_token_from_headers, ApiError, AppState};
use crate::api::responses::UserResponse;
use crate::models::{CreateUserInput, UserProfile};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Build the public auth routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build the auth routes that require a session
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateUserInput {
        email: body.email,
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
        password: body.password,
    };

    let user = state.user_service.register(input).await?;

    let response = UserResponse::from(UserProfile {
        user,
        is_subscribed: None,
    });

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, session) = state.user_service.login(&body.email, &body.password).await?;

    Ok(Json(AuthResponse {
        token: session.id,
        user: UserResponse::from(UserProfile {
            user,
            is_subscribed: Some(false),
        }),
    }))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = request_token_from_headers(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.user_service.logout(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}
