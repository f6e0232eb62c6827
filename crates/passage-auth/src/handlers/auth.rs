//! Authenticated user lookup.
//!
//! Resolves the verified user id to the user's primary identifier via the
//! management API.

use crate::errors::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::AuthStatusResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /auth
///
/// Requires the auth middleware. Returns the user's email, or phone when
/// the user has no email.
///
/// ## Response
///
/// ```json
/// {
///   "authStatus": "success",
///   "identifier": "alice@example.com"
/// }
/// ```
#[instrument(skip_all, name = "passage.handlers.auth")]
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<AuthStatusResponse>, ApiError> {
    let passage_user = state.passage.user().get(&user.user_id).await?;

    tracing::debug!(target: "passage.handlers.auth", "Resolved authenticated user");

    Ok(Json(AuthStatusResponse {
        auth_status: "success".to_string(),
        identifier: Some(passage_user.identifier().to_string()),
    }))
}
