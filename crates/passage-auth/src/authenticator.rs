//! Request authentication entry point.
//!
//! Runs extraction (per the configured strategy) and then verification.
//! Extraction failures keep their specific reason; any verification failure
//! becomes [`AuthError::InvalidToken`]. There are no retries within a call.

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::extractor::{extract_token, AuthStrategy, RequestHeaders};
use crate::auth::jwks::{KeySetSource, KeyStore};
use crate::auth::jwt::TokenVerifier;
use crate::config::Config;
use crate::errors::{AuthError, KeyStoreError};
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Authenticates requests carrying a Passage auth token.
///
/// Cheap to share behind an `Arc`; the key cache lives in the owned
/// [`KeyStore`].
pub struct Authenticator {
    strategy: AuthStrategy,
    verifier: TokenVerifier,
}

impl Authenticator {
    /// Create an authenticator fetching keys from the configured JWKS URL.
    ///
    /// # Errors
    ///
    /// Returns `KeyStoreError::Retrieval` if the JWKS HTTP client cannot be
    /// built.
    pub fn new(config: &Config) -> Result<Self, KeyStoreError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let key_store = Arc::new(KeyStore::from_config(config, Arc::clone(&clock))?);
        Ok(Self::from_parts(
            config.auth_strategy,
            TokenVerifier::new(key_store, clock, config.jwt_clock_skew_seconds),
        ))
    }

    /// Create an authenticator with a custom key source and clock.
    ///
    /// Cache TTL, rate limit, leeway and strategy still come from `config`.
    pub fn with_key_source(
        config: &Config,
        source: Arc<dyn KeySetSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let key_store = KeyStore::new(source, Arc::clone(&clock))
            .with_cache_ttl(config.jwks_cache_ttl)
            .with_invalid_kid_rate_limit(config.invalid_kid_rate_limit);

        Self::from_parts(
            config.auth_strategy,
            TokenVerifier::new(Arc::new(key_store), clock, config.jwt_clock_skew_seconds),
        )
    }

    pub fn from_parts(strategy: AuthStrategy, verifier: TokenVerifier) -> Self {
        Self { strategy, verifier }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        self.verifier.key_store()
    }

    /// Authenticate a request and return the verified user id.
    ///
    /// # Errors
    ///
    /// - Extraction errors (`HeaderMissing`, `MalformedHeader`,
    ///   `CookieMissing`, `AuthCookieNotFound`) when no token was found
    /// - `InvalidToken` when a token was found but failed verification
    #[instrument(skip_all, name = "passage.authenticate", fields(strategy = %self.strategy))]
    pub async fn authenticate_request<R>(&self, request: &R) -> Result<String, AuthError>
    where
        R: RequestHeaders + Sync + ?Sized,
    {
        let start = Instant::now();

        let token = match extract_token(request, self.strategy) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(target: "passage.authenticator", error = %e, "No auth token in request");
                metrics::record_authentication("extraction_failed", start.elapsed());
                return Err(e);
            }
        };

        let result = self.authenticate_token(token).await;

        let outcome = if result.is_ok() {
            "success"
        } else {
            "invalid_token"
        };
        metrics::record_authentication(outcome, start.elapsed());

        result
    }

    /// Verify an already extracted token and return the user id.
    pub async fn authenticate_token(&self, token: &str) -> Result<String, AuthError> {
        self.verifier.verify(token).await.map_err(|e| {
            tracing::debug!(target: "passage.authenticator", "Auth token failed verification");
            AuthError::from(e)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::JwksDocument;
    use crate::errors::KeyStoreError;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, HeaderValue};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptySource {
        fetch_count: AtomicUsize,
    }

    #[async_trait]
    impl KeySetSource for EmptySource {
        async fn fetch(&self) -> Result<JwksDocument, KeyStoreError> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            Ok(JwksDocument::default())
        }
    }

    fn authenticator(strategy: AuthStrategy) -> (Authenticator, Arc<EmptySource>) {
        let config = Config::new("app_test", SecretString::from("key"))
            .unwrap()
            .with_auth_strategy(strategy);
        let source = Arc::new(EmptySource {
            fetch_count: AtomicUsize::new(0),
        });
        let auth = Authenticator::with_key_source(&config, source.clone(), Arc::new(SystemClock));
        (auth, source)
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_verification() {
        let (auth, source) = authenticator(AuthStrategy::Cookie);

        let result = auth.authenticate_request(&HeaderMap::new()).await;

        assert_eq!(result, Err(AuthError::CookieMissing));
        assert_eq!(source.fetch_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_token_is_invalid_without_fetch() {
        let (auth, source) = authenticator(AuthStrategy::Header);
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer not-a-jwt"));

        let result = auth.authenticate_request(&headers).await;

        assert_eq!(result, Err(AuthError::InvalidToken));
        assert_eq!(source.fetch_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strategy_is_fixed_per_authenticator() {
        let (auth, _source) = authenticator(AuthStrategy::Header);
        assert_eq!(auth.strategy(), AuthStrategy::Header);

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("psg_auth_token=abc"));

        let result = auth.authenticate_request(&headers).await;
        assert_eq!(result, Err(AuthError::HeaderMissing));
    }
}
