//! API layer - HTTP handlers and routing
//!
//! All HTTP endpoints of the Platter service:
//! - Auth endpoints (register/login/logout)
//! - User endpoints with the follow toggle and subscriptions
//! - Tag and ingredient catalogs (read-only)
//! - Recipe CRUD with favorite/cart toggles and the PDF export
//! - Media file serving for stored recipe images

pub mod auth;
pub mod ingredients;
pub mod middleware;
pub mod recipes;
pub mod responses;
pub mod tags;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes that require a valid session
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::protected_router())
        .nest("/recipes", recipes::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    // Public routes; a valid token still attaches the viewer identity for
    // the viewer-relative flags
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/users", users::public_router())
        .nest("/tags", tags::router())
        .nest("/ingredients", ingredients::router())
        .nest("/recipes", recipes::public_router())
        .merge(protected_routes)
        // Outermost: resolve the bearer token once for every API route
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::resolve_session,
        ))
}

/// Build the complete router with middleware and media serving
pub fn build_router(
    state: AppState,
    cors_origin: &str,
    media_path: &std::path::Path,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service("/media", ServeDir::new(media_path))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
