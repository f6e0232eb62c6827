//! Passage authentication configuration.
//!
//! Configuration is loaded from environment variables (or a map, for tests)
//! or assembled with the builder methods. The API key is redacted in Debug
//! output.

use crate::auth::extractor::AuthStrategy;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default origin serving the JWKS document.
pub const DEFAULT_AUTH_ORIGIN: &str = "https://auth.passage.id";

/// Default origin of the management API.
pub const DEFAULT_API_ORIGIN: &str = "https://api.passage.id";

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Maximum JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default number of unknown-kid refetches allowed per second.
pub const DEFAULT_INVALID_KID_RATE_LIMIT: u32 = 10;

/// Default leeway applied to `exp`, `nbf` and `iat`.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 0;

/// Maximum allowed leeway.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 600;

/// Default bind address for the example backend.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Passage authentication configuration.
#[derive(Clone)]
pub struct Config {
    /// Passage application identifier.
    pub app_id: String,

    /// Management API key. Only the management clients see it.
    pub api_key: SecretString,

    /// Where the candidate token is read from (default: cookie).
    pub auth_strategy: AuthStrategy,

    /// Origin hosting `/v1/apps/{app_id}/.well-known/jwks.json`.
    pub auth_origin: String,

    /// Origin hosting the management API.
    pub api_origin: String,

    /// Freshness window for cached keys. `None` keeps keys until a
    /// miss-forced refetch or process restart.
    pub jwks_cache_ttl: Option<Duration>,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Unknown-kid refetches allowed per one-second window.
    pub invalid_kid_rate_limit: u32,

    /// Leeway in seconds for `exp`, `nbf` and `iat`.
    pub jwt_clock_skew_seconds: i64,

    /// Example backend bind address (default: "0.0.0.0:8080").
    pub bind_address: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("api_key", &"[REDACTED]")
            .field("auth_strategy", &self.auth_strategy)
            .field("auth_origin", &self.auth_origin)
            .field("api_origin", &self.api_origin)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("invalid_kid_rate_limit", &self.invalid_kid_rate_limit)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("bind_address", &self.bind_address)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid app id: {0}")]
    InvalidAppId(String),

    #[error("Invalid auth strategy: {0}")]
    InvalidAuthStrategy(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl Config {
    /// Create a configuration with defaults for everything but the credentials.
    pub fn new(app_id: impl Into<String>, api_key: SecretString) -> Result<Self, ConfigError> {
        let app_id = app_id.into();
        validate_app_id(&app_id)?;

        Ok(Config {
            app_id,
            api_key,
            auth_strategy: AuthStrategy::default(),
            auth_origin: DEFAULT_AUTH_ORIGIN.to_string(),
            api_origin: DEFAULT_API_ORIGIN.to_string(),
            jwks_cache_ttl: None,
            jwks_fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            invalid_kid_rate_limit: DEFAULT_INVALID_KID_RATE_LIMIT,
            jwt_clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        })
    }

    pub fn with_auth_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.auth_strategy = strategy;
        self
    }

    pub fn with_auth_origin(mut self, origin: impl Into<String>) -> Self {
        self.auth_origin = origin.into();
        self
    }

    pub fn with_api_origin(mut self, origin: impl Into<String>) -> Self {
        self.api_origin = origin.into();
        self
    }

    pub fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = Some(ttl);
        self
    }

    pub fn with_jwks_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.jwks_fetch_timeout = timeout;
        self
    }

    /// Set the unknown-kid refetch budget per second.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRateLimit` if `per_second` is 0.
    pub fn with_invalid_kid_rate_limit(mut self, per_second: u32) -> Result<Self, ConfigError> {
        if per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "invalid kid rate limit must be greater than 0".to_string(),
            ));
        }
        self.invalid_kid_rate_limit = per_second;
        Ok(self)
    }

    pub fn with_clock_skew_seconds(mut self, seconds: i64) -> Self {
        self.jwt_clock_skew_seconds = seconds;
        self
    }

    /// URL of the application's JWKS document.
    pub fn jwks_url(&self) -> String {
        format!(
            "{}/v1/apps/{}/.well-known/jwks.json",
            self.auth_origin.trim_end_matches('/'),
            self.app_id
        )
    }

    /// Base URL for the application's management endpoints.
    pub fn api_base_url(&self) -> String {
        format!(
            "{}/v1/apps/{}",
            self.api_origin.trim_end_matches('/'),
            self.app_id
        )
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let app_id = vars
            .get("PASSAGE_APP_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("PASSAGE_APP_ID".to_string()))?
            .clone();

        let api_key = vars
            .get("PASSAGE_API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("PASSAGE_API_KEY".to_string()))?;

        let mut config = Config::new(app_id, SecretString::from(api_key.as_str()))?;

        if let Some(value_str) = vars.get("PASSAGE_AUTH_STRATEGY") {
            config.auth_strategy = value_str.parse().map_err(|_| {
                ConfigError::InvalidAuthStrategy(format!(
                    "PASSAGE_AUTH_STRATEGY must be HEADER or COOKIE, got '{}'",
                    value_str
                ))
            })?;
        }

        if let Some(origin) = vars.get("PASSAGE_AUTH_ORIGIN") {
            config.auth_origin = origin.clone();
        }

        if let Some(origin) = vars.get("PASSAGE_API_ORIGIN") {
            config.api_origin = origin.clone();
        }

        // Parse JWKS cache TTL with validation
        if let Some(value_str) = vars.get("PASSAGE_JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCache(format!(
                    "PASSAGE_JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCache(
                    "PASSAGE_JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            config.jwks_cache_ttl = Some(Duration::from_secs(value));
        }

        // Parse JWKS fetch timeout with validation
        if let Some(value_str) = vars.get("PASSAGE_JWKS_FETCH_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCache(format!(
                    "PASSAGE_JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidJwksCache(format!(
                    "PASSAGE_JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_JWKS_FETCH_TIMEOUT_SECONDS, value
                )));
            }

            config.jwks_fetch_timeout = Duration::from_secs(value);
        }

        // Parse invalid kid rate limit with validation
        if let Some(value_str) = vars.get("PASSAGE_INVALID_KID_RATE_LIMIT") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRateLimit(format!(
                    "PASSAGE_INVALID_KID_RATE_LIMIT must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRateLimit(
                    "PASSAGE_INVALID_KID_RATE_LIMIT must be greater than 0".to_string(),
                ));
            }

            config.invalid_kid_rate_limit = value;
        }

        // Parse JWT clock skew tolerance with validation
        if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW_SECONDS {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            config.jwt_clock_skew_seconds = value;
        }

        if let Some(bind_address) = vars.get("BIND_ADDRESS") {
            config.bind_address = bind_address.clone();
        }

        Ok(config)
    }
}

fn validate_app_id(app_id: &str) -> Result<(), ConfigError> {
    if app_id.is_empty() {
        return Err(ConfigError::InvalidAppId(
            "app id must not be empty".to_string(),
        ));
    }

    // Interpolated into URL paths
    if !app_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::InvalidAppId(format!(
            "app id may only contain [A-Za-z0-9_-], got '{}'",
            app_id
        )));
    }

    Ok(())
}
