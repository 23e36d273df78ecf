//! Admin article routes. Authentication/session handling sits in front of
//! these routes and is out of scope here.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::domains::articles::{find_duplicates, PublishError};
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct PublishResponse {
    pub id: i64,
    pub canonical_url: String,
    pub live: bool,
    /// False means degraded success: the article is live but its search
    /// document was not accepted yet; the reindex job converges it.
    pub search_synced: bool,
}

fn error_response(status: StatusCode, error: &PublishError) -> Response {
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

/// POST /admin/articles/:draft_id/publish
pub async fn publish_handler(
    Extension(state): Extension<AppState>,
    Path(draft_id): Path<i64>,
) -> Response {
    match state.orchestrator.publish(draft_id).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(PublishResponse {
                id: outcome.article.id,
                canonical_url: outcome.article.canonical_url,
                live: outcome.article.live,
                search_synced: outcome.search_synced,
            }),
        )
            .into_response(),
        Err(error) => {
            let status = match &error {
                PublishError::DraftNotFound(_) | PublishError::PublishedNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                PublishError::AlreadyPublished { .. }
                | PublishError::DuplicateCanonicalUrl { .. } => StatusCode::CONFLICT,
                PublishError::EmptyCanonicalUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => {
                    tracing::error!(draft_id, error = %error, "publish failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            error_response(status, &error)
        }
    }
}

/// GET /admin/duplicate-urls
///
/// Read-only scan over the authoritative store; callers may cache the
/// result.
pub async fn duplicate_urls_handler(Extension(state): Extension<AppState>) -> Response {
    match find_duplicates(state.kernel.articles.as_ref()).await {
        Ok(groups) => (StatusCode::OK, Json(groups)).into_response(),
        Err(error) => {
            tracing::error!(error = %error, "duplicate scan failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "duplicate scan failed" })),
            )
                .into_response()
        }
    }
}
