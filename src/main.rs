//! Platter - a recipe-sharing platform backend

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use platter::{
    api::{self, AppState},
    cache::MemoryCache,
    config::Config,
    db::{
        self,
        repositories::{
            SessionRepository, SqlxIngredientRepository, SqlxRecipeRepository,
            SqlxSessionRepository, SqlxTagRepository, SqlxUserRepository,
        },
    },
    services::{ImageStore, IngredientService, RecipeService, TagService, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "platter=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Platter...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let tag_repo = SqlxTagRepository::boxed(pool.clone());
    let ingredient_repo = SqlxIngredientRepository::boxed(pool.clone());
    let recipe_repo = SqlxRecipeRepository::boxed(pool.clone());

    // Initialize services
    let cache = Arc::new(MemoryCache::new());
    let user_service = Arc::new(UserService::new(user_repo, session_repo.clone()));
    let tag_service = Arc::new(TagService::new(tag_repo.clone(), cache.clone()));
    let ingredient_service = Arc::new(IngredientService::new(ingredient_repo.clone(), cache));
    let recipe_service = Arc::new(RecipeService::new(
        recipe_repo,
        tag_repo,
        ingredient_repo,
        ImageStore::new(&config.media),
    ));

    // Prune sessions left over from previous runs
    let pruned = session_repo.delete_expired().await?;
    if pruned > 0 {
        tracing::info!(pruned, "Expired sessions removed");
    }

    // Build application state
    let state = AppState {
        user_service,
        recipe_service,
        tag_service,
        ingredient_service,
        page_size: config.pagination.page_size,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin, &config.media.path);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
