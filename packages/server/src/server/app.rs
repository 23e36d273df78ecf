//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::domains::articles::PublishOrchestrator;
use crate::kernel::ServerKernel;
use crate::server::routes::{duplicate_urls_handler, health_handler, publish_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub kernel: Arc<ServerKernel>,
    pub orchestrator: Arc<PublishOrchestrator>,
}

/// Build the router. Admin routes carry no destructive operations; corpus
/// reset and reindex run as out-of-band binaries only.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin/articles/:draft_id/publish", post(publish_handler))
        .route("/admin/duplicate-urls", get(duplicate_urls_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
