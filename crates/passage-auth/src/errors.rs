//! Error types for request authentication and the Passage management API.
//!
//! Authentication failures map to 401 via the `IntoResponse` impl. Messages
//! returned to clients only describe the shape of the request (missing header,
//! missing cookie). Cryptographic failure reasons are logged server-side and
//! collapse into a single opaque `InvalidToken`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Classified authentication failure returned to the request-handling layer.
///
/// Extraction variants are specific because they describe the request, not
/// the token. Every verification failure is reported as `InvalidToken`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Header authorization not found")]
    HeaderMissing,

    #[error("Authorization header is malformed, expected 'Bearer <token>'")]
    MalformedHeader,

    #[error("Could not find valid cookie for authentication")]
    CookieMissing,

    #[error("Could not find authentication cookie 'psg_auth_token'")]
    AuthCookieNotFound,

    #[error("Could not validate auth token")]
    InvalidToken,
}

impl AuthError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::HeaderMissing => "HEADER_MISSING",
            AuthError::MalformedHeader => "MALFORMED_HEADER",
            AuthError::CookieMissing => "COOKIE_MISSING",
            AuthError::AuthCookieNotFound => "AUTH_COOKIE_NOT_FOUND",
            AuthError::InvalidToken => "INVALID_TOKEN",
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        401
    }

    /// True when no candidate token could be located in the request.
    pub fn is_extraction_failure(&self) -> bool {
        !matches!(self, AuthError::InvalidToken)
    }
}

/// Opaque token verification failure.
///
/// Malformed header, unknown key, bad signature, expired, and missing subject
/// all produce this same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The auth token is invalid or expired")]
pub struct InvalidToken;

impl From<InvalidToken> for AuthError {
    fn from(_: InvalidToken) -> Self {
        AuthError::InvalidToken
    }
}

/// Key store lookup failure.
///
/// `NotFound` and `RateLimited` are behaviorally identical to callers; they
/// are kept apart so they can be logged and counted separately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    #[error("No signing key matches the requested key id")]
    NotFound,

    #[error("Unknown key id lookups are rate limited")]
    RateLimited,

    #[error("Failed to retrieve key set: {0}")]
    Retrieval(String),
}

/// Management API client error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Passage API request failed: {0}")]
    Transport(String),

    #[error("Passage API rejected the API key")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Passage API returned status {0}")]
    Upstream(u16),

    #[error("Failed to decode Passage API response: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code surfaced to our own clients.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) | ApiError::InvalidInput(_) => 400,
            ApiError::Transport(_) | ApiError::Upstream(_) | ApiError::Decode(_) => 502,
            ApiError::Unauthorized | ApiError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = error_response(StatusCode::UNAUTHORIZED, self.code(), self.to_string());

        if let Ok(header_value) = "Bearer realm=\"passage\", error=\"invalid_token\"".parse() {
            response
                .headers_mut()
                .insert("WWW-Authenticate", header_value);
        }

        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            ApiError::BadRequest(reason) | ApiError::InvalidInput(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            ApiError::Transport(_) | ApiError::Upstream(_) | ApiError::Decode(_) => {
                tracing::warn!(target: "passage.services.api", error = %self, "Upstream API failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Identity provider is unavailable".to_string(),
                )
            }
            ApiError::Unauthorized | ApiError::Internal(_) => {
                tracing::error!(target: "passage.services.api", error = %self, "Internal API client failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        error_response(status, code, message)
    }
}
