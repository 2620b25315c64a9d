//! Ingredient API endpoints
//!
//! Read-only catalog:
//! - GET /api/ingredients?name=<prefix> - list with prefix search
//! - GET /api/ingredients/{id} - one ingredient

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Ingredient;

/// Query parameters for the ingredient list
#[derive(Debug, Deserialize)]
pub struct ListIngredientsQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// Ingredient payload
#[derive(Debug, Serialize)]
pub struct IngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl From<Ingredient> for IngredientResponse {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

/// Build the ingredients router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ingredients))
        .route("/{id}", get(get_ingredient))
}

/// GET /api/ingredients - list, optionally filtered by name prefix
async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<ListIngredientsQuery>,
) -> Result<Json<Vec<IngredientResponse>>, ApiError> {
    let ingredients = state
        .ingredient_service
        .search(query.name.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to list ingredients: {:#}", e);
            ApiError::internal_error("Failed to list ingredients")
        })?;

    Ok(Json(
        ingredients.into_iter().map(IngredientResponse::from).collect(),
    ))
}

/// GET /api/ingredients/{id}
async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IngredientResponse>, ApiError> {
    let ingredient = state
        .ingredient_service
        .get(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get ingredient: {:#}", e);
            ApiError::internal_error("Failed to get ingredient")
        })?
        .ok_or_else(|| {
            ApiError::not_found(format!("Ingredient with id = {} not found", id))
        })?;

    Ok(Json(IngredientResponse::from(ingredient)))
}
