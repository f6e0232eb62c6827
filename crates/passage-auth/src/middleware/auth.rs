//! Authentication middleware for protected routes.
//!
//! Authenticates the request with the configured strategy and injects the
//! verified user id into request extensions.

use crate::authenticator::Authenticator;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
}

/// Verified identity placed in request extensions by [`require_auth`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Passage user id (the token's `sub`).
    pub user_id: String,
}

/// Custom Debug implementation that redacts the user id.
impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user_id", &"[REDACTED]")
            .finish()
    }
}

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized with a WWW-Authenticate header if no token is
///   found or the token fails verification
/// - Continues to the next handler with [`AuthenticatedUser`] in extensions
#[instrument(skip(state, req, next), name = "passage.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let user_id = state
        .authenticator
        .authenticate_request(req.headers())
        .await
        .map_err(|e| {
            tracing::debug!(target: "passage.middleware.auth", error_code = e.code(), "Rejecting unauthenticated request");
            e
        })?;

    req.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(req).await)
}

/// Extension trait for reading the authenticated user from a request.
pub trait AuthenticatedUserExt {
    /// Returns `None` if the auth middleware was not applied.
    fn authenticated_user(&self) -> Option<&AuthenticatedUser>;
}

impl<B> AuthenticatedUserExt for axum::http::Request<B> {
    fn authenticated_user(&self) -> Option<&AuthenticatedUser> {
        self.extensions().get::<AuthenticatedUser>()
    }
}
