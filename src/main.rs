//! WPS Cloud Backend Server
//!
//! Model-serving backend for RSSI-based indoor positioning.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WPS CLOUD                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌────────────┐  ┌──────────────────────────┐ │
//! │  │  API      │  │  Version   │  │  Inference               │ │
//! │  │  Gateway  │  │  Resolver  │  │  Orchestrator            │ │
//! │  │  (Axum)   │  │  + Cache   │  │  (clustering -> k-NN)    │ │
//! │  └─────┬─────┘  └─────┬──────┘  └────────────┬─────────────┘ │
//! │        └──────────────┼─────────────────────-┘               │
//! │                       ▼                                      │
//! │                ┌─────────────┐                               │
//! │                │ PostgreSQL  │  (model artifact blob store)  │
//! │                └─────────────┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod model;
mod orchestrator;
mod resolver;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache::ResolutionCache;
use store::{ArtifactStore, PgArtifactStore};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wps_cloud=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("WPS Cloud Server starting...");
    tracing::info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Build application state
    let store = Arc::new(PgArtifactStore::new(pool));
    let cache = Arc::new(ResolutionCache::new(
        Arc::clone(&store) as Arc<dyn ArtifactStore>
    ));
    let state = AppState {
        store,
        cache,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PgArtifactStore>,
    pub cache: Arc<ResolutionCache>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        // Position estimation is open to positioning clients
        .route("/api/v1/position", post(handlers::position::locate));

    // Model management routes (operator JWT auth)
    let management_routes = Router::new()
        .route("/api/v1/models", post(handlers::artifacts::upload))
        .route("/api/v1/models", get(handlers::artifacts::list))
        .route("/api/v1/models/active", get(handlers::artifacts::active))
        .route("/api/v1/models/:id", get(handlers::artifacts::get))
        .route("/api/v1/models/:id", delete(handlers::artifacts::delete))
        .route(
            "/api/v1/models/:id/download",
            get(handlers::artifacts::download),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        // Model artifacts can be large; the 2 MB default is too small
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(management_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
