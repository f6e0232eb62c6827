//! Health check handler.
//!
//! Liveness only: the backend has no local dependencies worth probing, and
//! the JWKS is fetched lazily on the first authenticated request.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /health
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "app_id": "app_abc123"
/// }
/// ```
#[instrument(skip_all, name = "passage.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        app_id: state.config.app_id.clone(),
    })
}
