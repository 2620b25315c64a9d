//! Recipe API endpoints
//!
//! - GET /api/recipes - filtered, paginated listing
//! - POST /api/recipes - create (auth)
//! - GET /api/recipes/{id} - detail
//! - PATCH /api/recipes/{id} - full re-write (author only; PUT is not
//!   routed and answers 405)
//! - DELETE /api/recipes/{id} - delete (author only)
//! - POST/DELETE /api/recipes/{id}/favorite - favorite toggle
//! - POST/DELETE /api/recipes/{id}/shopping_cart - cart toggle
//! - GET /api/recipes/download_shopping_cart - consolidated PDF export

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{RecipeMinifiedResponse, RecipeResponse};
use crate::models::{IngredientAmount, ListParams, RecipeFilter, RecipeInput};
use crate::services::{shopping_list, RecipeServiceError};

/// Scalar query parameters for the recipe listing; the repeatable `tags`
/// key is pulled from the raw query string separately.
#[derive(Debug, Deserialize)]
pub struct ListRecipesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<i64>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// Request body for creating or re-writing a recipe
#[derive(Debug, Deserialize)]
pub struct RecipeWriteRequest {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    /// Base64 data URI; optional on update (keeps the stored image)
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmountRequest>,
}

/// An (id, amount) pair from the write payload
#[derive(Debug, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: i64,
    pub amount: i64,
}

impl From<RecipeWriteRequest> for RecipeInput {
    fn from(body: RecipeWriteRequest) -> Self {
        Self {
            name: body.name,
            text: body.text,
            cooking_time: body.cooking_time,
            image: body.image,
            tags: body.tags,
            ingredients: body
                .ingredients
                .into_iter()
                .map(|item| IngredientAmount {
                    id: item.id,
                    amount: item.amount,
                })
                .collect(),
        }
    }
}

/// Paginated recipe list
#[derive(Debug, serde::Serialize)]
pub struct RecipeListResponse {
    pub recipes: Vec<RecipeResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Build the public recipe routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes))
        .route("/{id}", get(get_recipe))
}

/// Build the recipe routes that require a session
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_recipe))
        .route("/download_shopping_cart", get(download_shopping_cart))
        .route("/{id}", patch(update_recipe).delete(delete_recipe))
        .route("/{id}/favorite", post(add_favorite).delete(remove_favorite))
        .route("/{id}/shopping_cart", post(add_to_cart).delete(remove_from_cart))
}

/// GET /api/recipes
async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<ListRecipesQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<RecipeListResponse>, ApiError> {
    let params = ListParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.page_size),
    );

    let filter = RecipeFilter {
        author: query.author,
        tags: tag_slugs(raw_query.as_deref()),
        favorited_only: flag_set(query.is_favorited.as_deref()),
        in_cart_only: flag_set(query.is_in_shopping_cart.as_deref()),
    };

    let page = state
        .recipe_service
        .list(&filter, viewer.id(), &params)
        .await?;

    let total = page.total;
    let page_no = page.page;
    let per_page = page.per_page;
    let total_pages = page.total_pages();

    // One lookup per distinct author on the page
    let mut author_flags: std::collections::HashMap<i64, Option<bool>> =
        std::collections::HashMap::new();
    let mut recipes = Vec::with_capacity(page.items.len());
    for details in page.items {
        let author_id = details.author.id;
        let author_flag = match author_flags.get(&author_id) {
            Some(flag) => *flag,
            None => {
                let flag = author_subscription_flag(&state, &viewer, author_id).await?;
                author_flags.insert(author_id, flag);
                flag
            }
        };
        recipes.push(RecipeResponse::from_details(details, author_flag));
    }

    Ok(Json(RecipeListResponse {
        recipes,
        total,
        page: page_no,
        page_size: per_page,
        total_pages,
    }))
}

/// GET /api/recipes/{id}
async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let details = state.recipe_service.get(id, viewer.id()).await?;
    let author_flag = author_subscription_flag(&state, &viewer, details.author.id).await?;
    Ok(Json(RecipeResponse::from_details(details, author_flag)))
}

/// POST /api/recipes
async fn create_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<RecipeWriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.recipe_service.create(&user, body.into()).await?;

    let author_flag = Some(false); // authors never follow themselves
    Ok((
        StatusCode::CREATED,
        Json(RecipeResponse::from_details(details, author_flag)),
    ))
}

/// PATCH /api/recipes/{id}
///
/// Performs a full replacement of the tag and ingredient sets.
async fn update_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RecipeWriteRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let details = state.recipe_service.update(&user, id, body.into()).await?;
    Ok(Json(RecipeResponse::from_details(details, Some(false))))
}

/// DELETE /api/recipes/{id}
async fn delete_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.recipe_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/recipes/{id}/favorite
async fn add_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = state
        .recipe_service
        .favorite(user.id, id)
        .await
        .map_err(toggle_error)?;

    Ok((StatusCode::CREATED, Json(RecipeMinifiedResponse::from(recipe))))
}

/// DELETE /api/recipes/{id}/favorite
async fn remove_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .recipe_service
        .unfavorite(user.id, id)
        .await
        .map_err(toggle_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/recipes/{id}/shopping_cart
async fn add_to_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = state
        .recipe_service
        .add_to_cart(user.id, id)
        .await
        .map_err(toggle_error)?;

    Ok((StatusCode::CREATED, Json(RecipeMinifiedResponse::from(recipe))))
}

/// DELETE /api/recipes/{id}/shopping_cart
async fn remove_from_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .recipe_service
        .remove_from_cart(user.id, id)
        .await
        .map_err(toggle_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/recipes/download_shopping_cart
///
/// Returns the consolidated shopping list as a PDF attachment.
async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, ApiError> {
    let items = state.recipe_service.shopping_list(user.id).await?;

    let bytes = shopping_list::render_pdf(&items).map_err(|e| {
        tracing::error!("Failed to render shopping list PDF: {:#}", e);
        ApiError::internal_error("Failed to render shopping list")
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.pdf\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Toggle endpoints report an unknown recipe as a payload error (400
/// naming the id), not as a missing URL.
fn toggle_error(err: RecipeServiceError) -> ApiError {
    match err {
        RecipeServiceError::RecipeNotFound(id) => {
            ApiError::bad_reference(format!("Recipe with id = {} not found", id))
        }
        other => other.into(),
    }
}

/// `1`/`true` switches a relation filter on; anything else leaves it off.
fn flag_set(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true") | Some("True"))
}

/// Collect the repeatable `tags` key from the raw query string.
///
/// Tag slugs are restricted to `[A-Za-z0-9_]`, so no percent-decoding is
/// needed.
fn tag_slugs(raw_query: Option<&str>) -> Vec<String> {
    let Some(raw) = raw_query else {
        return Vec::new();
    };

    raw.split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == "tags")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

async fn author_subscription_flag(
    state: &AppState,
    viewer: &MaybeUser,
    author_id: i64,
) -> Result<Option<bool>, ApiError> {
    Ok(state
        .user_service
        .subscription_flag(viewer.id(), author_id)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_slugs_collects_repeated_keys() {
        let slugs = tag_slugs(Some("page=1&tags=breakfast&tags=lunch&limit=6"));
        assert_eq!(slugs, vec!["breakfast".to_string(), "lunch".to_string()]);
    }

    #[test]
    fn test_tag_slugs_empty_query() {
        assert!(tag_slugs(None).is_empty());
        assert!(tag_slugs(Some("")).is_empty());
        assert!(tag_slugs(Some("tags=")).is_empty());
    }

    #[test]
    fn test_flag_set_accepts_one_and_true() {
        assert!(flag_set(Some("1")));
        assert!(flag_set(Some("true")));
        assert!(flag_set(Some("True")));
        assert!(!flag_set(Some("0")));
        assert!(!flag_set(Some("false")));
        assert!(!flag_set(None));
    }
}
