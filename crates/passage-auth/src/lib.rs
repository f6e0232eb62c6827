//! Passage Authentication Library
//!
//! Authenticates HTTP requests carrying Passage-issued JWTs and wraps the
//! Passage management API:
//!
//! - Token extraction from the `Authorization` header or the
//!   `psg_auth_token` cookie
//! - JWKS caching with a rate-limited refetch on unknown key ids
//! - Signature and time-claim verification
//! - User, device, app and magic-link management
//!
//! # Architecture
//!
//! ```text
//! extractor ─┐
//!            ├─> Authenticator ─> Passage <─ services (management API)
//! KeyStore ─> TokenVerifier ─┘
//! ```
//!
//! The example backend follows the Handler -> Service pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> passage.rs -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, key store and JWT verification
//! - `authenticator` - Extract-then-verify request authentication
//! - `config` - Configuration from environment or builder
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - Example backend request handlers
//! - `middleware` - Axum authentication and HTTP metrics middleware
//! - `models` - Management API data models
//! - `observability` - Prometheus metrics
//! - `passage` - Facade bundling authentication and management
//! - `routes` - Example backend router
//! - `services` - Management API clients

pub mod auth;
pub mod authenticator;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod passage;
pub mod routes;
pub mod services;

pub use auth::{AuthStrategy, Clock, KeySetSource, KeyStore, SystemClock, TokenVerifier};
pub use authenticator::Authenticator;
pub use config::{Config, ConfigError};
pub use errors::{ApiError, AuthError, InvalidToken, KeyStoreError};
pub use passage::Passage;
pub use secrecy::{ExposeSecret, SecretString};
