//! HTTP middleware.
//!
//! # Components
//!
//! - `auth` - Rejects unauthenticated requests, injects the user id
//! - `http_metrics` - Request counters and latency for the example backend

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState, AuthenticatedUser, AuthenticatedUserExt};
pub use http_metrics::http_metrics_middleware;
