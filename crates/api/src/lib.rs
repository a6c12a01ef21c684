//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes for equipment and their files
//! - The `/files/{file_id}` download endpoint
//! - JSON error responses

pub mod error;
pub mod routes;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use fieldops_core::storage::FileStorage;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// File storage shared by every request.
    pub storage: Arc<FileStorage>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::files::routes())
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
