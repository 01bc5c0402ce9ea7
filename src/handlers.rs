//! HTTP route handlers.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::FetchError;
use crate::models::{FetchMetadataRequest, LinkMetadata};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/fetch-metadata", post(fetch_metadata))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Metadata Handler
// ============================================================================

pub async fn fetch_metadata(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FetchMetadataRequest>,
) -> Result<Json<LinkMetadata>, FetchError> {
    match state.fetcher.fetch(&body.url).await {
        Ok(metadata) => Ok(Json(metadata)),
        Err(e) => {
            tracing::error!(url = %body.url, error = %e, "error fetching metadata");
            Err(e)
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "linknotes"
    }))
}
