//! Tag API endpoints
//!
//! Read-only catalog:
//! - GET /api/tags - full tag list
//! - GET /api/tags/{id} - one tag

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::TagResponse;

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{id}", get(get_tag))
}

/// GET /api/tags - all tags, unpaginated
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagResponse>>, ApiError> {
    let tags = state.tag_service.list().await.map_err(|e| {
        tracing::error!("Failed to list tags: {:#}", e);
        ApiError::internal_error("Failed to list tags")
    })?;

    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

/// GET /api/tags/{id}
async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TagResponse>, ApiError> {
    let tag = state
        .tag_service
        .get(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get tag: {:#}", e);
            ApiError::internal_error("Failed to get tag")
        })?
        .ok_or_else(|| ApiError::not_found(format!("Tag with id = {} not found", id)))?;

    Ok(Json(TagResponse::from(tag)))
}
