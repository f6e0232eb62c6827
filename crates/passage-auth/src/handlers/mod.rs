//! HTTP request handlers for the example backend.

pub mod auth;
pub mod health;
pub mod metrics;

pub use auth::authenticate;
pub use health::health_check;
pub use metrics::metrics_handler;
