//! User API endpoints
//!
//! - GET /api/users - user list (paginated)
//! - GET /api/users/me - the authenticated user
//! - GET /api/users/{id} - one user
//! - GET /api/users/subscriptions - followed authors with their recipes
//! - POST/DELETE /api/users/{id}/subscribe - follow toggle

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{RecipeMinifiedResponse, UserResponse};
use crate::models::{ListParams, UserProfile};

/// Query parameters for paginated user listings
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Query parameters for the subscriptions listing
#[derive(Debug, Deserialize)]
pub struct SubscriptionsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Cap on the recipes embedded per author
    pub recipes_limit: Option<i64>,
}

/// Paginated user list
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// A followed author with their recipes
#[derive(Debug, Serialize)]
pub struct AuthorWithRecipesResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeMinifiedResponse>,
    pub recipes_count: i64,
}

/// Paginated subscriptions list
#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub authors: Vec<AuthorWithRecipesResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Build the public user routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
}

/// Build the user routes that require a session
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/subscriptions", get(subscriptions))
        .route("/{id}/subscribe", post(subscribe).delete(unsubscribe))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let params = ListParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.page_size),
    );

    let page = state.user_service.list_profiles(&params, viewer.id()).await?;

    let total = page.total;
    let page_no = page.page;
    let per_page = page.per_page;
    let total_pages = page.total_pages();

    Ok(Json(UserListResponse {
        users: page.items.into_iter().map(UserResponse::from).collect(),
        total,
        page: page_no,
        page_size: per_page,
        total_pages,
    }))
}

/// GET /api/users/me
async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state.user_service.get_profile(user.id, Some(user.id)).await?;
    Ok(Json(UserResponse::from(profile)))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state.user_service.get_profile(id, viewer.id()).await?;
    Ok(Json(UserResponse::from(profile)))
}

/// GET /api/users/subscriptions
async fn subscriptions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<SubscriptionListResponse>, ApiError> {
    let params = ListParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.page_size),
    );

    let page = state.user_service.subscriptions(&user, &params).await?;

    let total = page.total;
    let page_no = page.page;
    let per_page = page.per_page;
    let total_pages = page.total_pages();

    let mut authors = Vec::with_capacity(page.items.len());
    for profile in page.items {
        authors.push(author_with_recipes(&state, profile, query.recipes_limit).await?);
    }

    Ok(Json(SubscriptionListResponse {
        authors,
        total,
        page: page_no,
        page_size: per_page,
        total_pages,
    }))
}

/// POST /api/users/{id}/subscribe
async fn subscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AuthorWithRecipesResponse>, ApiError> {
    let profile = state.user_service.subscribe(&user, id).await?;
    let author = author_with_recipes(&state, profile, None).await?;
    Ok(Json(author))
}

/// DELETE /api/users/{id}/subscribe
async fn unsubscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.unsubscribe(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn author_with_recipes(
    state: &AppState,
    profile: UserProfile,
    recipes_limit: Option<i64>,
) -> Result<AuthorWithRecipesResponse, ApiError> {
    let author_id = profile.user.id;

    let recipes = state
        .recipe_service
        .by_author(author_id, recipes_limit)
        .await?;
    let recipes_count = state.recipe_service.count_by_author(author_id).await?;

    Ok(AuthorWithRecipesResponse {
        user: UserResponse::from(profile),
        recipes: recipes
            .into_iter()
            .map(RecipeMinifiedResponse::from)
            .collect(),
        recipes_count,
    })
}
