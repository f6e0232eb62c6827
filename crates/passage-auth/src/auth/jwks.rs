//! Key store for fetching and caching Passage signing keys.
//!
//! The key store fetches the application's JWKS document from
//! `{auth_origin}/v1/apps/{app_id}/.well-known/jwks.json` and serves
//! signing keys by `kid`.
//!
//! # Caching
//!
//! - The first lookup (or the first after the freshness window expires)
//!   fetches the whole set and atomically replaces the cached mapping
//! - A `kid` missing from a fresh cache forces one refetch before the
//!   lookup concludes `NotFound`
//! - Miss-forced refetches are capped by [`InvalidKidRateLimiter`]; beyond
//!   the cap, unknown `kid`s resolve to `RateLimited` without a network call
//! - Concurrent refetches are single-flighted behind a mutex; a waiter that
//!   finds a newer generation in the cache reuses it, and a waiter queued
//!   behind a failed attempt shares that attempt's error
//!
//! # Security
//!
//! - A failed fetch never serves an expired mapping
//! - Keys marked `use = enc`, symmetric keys and unsupported algorithms are
//!   skipped; they can never verify a token

use crate::auth::clock::Clock;
use crate::auth::rate_limit::InvalidKidRateLimiter;
use crate::config::Config;
use crate::errors::KeyStoreError;
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Longest `kid` the store will look up.
pub const MAX_KID_LENGTH: usize = 64;

/// Raw JWKS document.
///
/// Keys stay untyped until [`parse_signing_key`] so that one unusable entry
/// does not reject the whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<serde_json::Value>,
}

/// Where key sets come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set.
    ///
    /// Transport errors, non-2xx statuses, timeouts and malformed documents
    /// are all reported as `KeyStoreError::Retrieval`.
    async fn fetch(&self) -> Result<JwksDocument, KeyStoreError>;
}

/// Fetches the JWKS document over HTTPS.
pub struct HttpKeySetSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `jwks_url` whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `KeyStoreError::Retrieval` if the HTTP client cannot be built.
    pub fn new(jwks_url: String, timeout: Duration) -> Result<Self, KeyStoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "passage.auth.jwks", error = %e, "Failed to build JWKS HTTP client");
                KeyStoreError::Retrieval("failed to build JWKS HTTP client".to_string())
            })?;

        Ok(Self {
            jwks_url,
            http_client,
        })
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    async fn fetch_document(&self) -> Result<JwksDocument, KeyStoreError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KeyStoreError::Retrieval("JWKS request timed out".to_string())
                } else {
                    KeyStoreError::Retrieval(format!("JWKS request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyStoreError::Retrieval(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        response.json::<JwksDocument>().await.map_err(|e| {
            if e.is_timeout() {
                KeyStoreError::Retrieval("JWKS request timed out".to_string())
            } else {
                KeyStoreError::Retrieval(format!("Failed to parse JWKS response: {}", e))
            }
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<JwksDocument, KeyStoreError> {
        tracing::debug!(target: "passage.auth.jwks", "Fetching JWKS");
        let start = Instant::now();

        let result = self.fetch_document().await;

        let status = match &result {
            Ok(_) => "success",
            Err(_) => "error",
        };
        metrics::record_jwks_fetch(status, start.elapsed());

        if let Err(e) = &result {
            tracing::error!(target: "passage.auth.jwks", error = %e, "Failed to fetch JWKS");
        }

        result
    }
}

/// A public key usable for verifying token signatures.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, algorithm: Algorithm, decoding_key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            decoding_key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The only algorithm this key verifies.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Turn one JWKS entry into a [`SigningKey`].
///
/// Returns a description of the problem when the entry cannot verify
/// signatures.
pub fn parse_signing_key(value: serde_json::Value) -> Result<SigningKey, String> {
    let jwk: Jwk = serde_json::from_value(value).map_err(|e| format!("malformed JWK: {}", e))?;

    let kid = jwk
        .common
        .key_id
        .clone()
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| "JWK has no kid".to_string())?;

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err(format!("JWK '{}' is an encryption key", kid));
    }

    let algorithm = resolve_algorithm(&jwk).map_err(|reason| format!("JWK '{}': {}", kid, reason))?;

    let decoding_key = DecodingKey::from_jwk(&jwk)
        .map_err(|e| format!("JWK '{}' has invalid key material: {}", kid, e))?;

    Ok(SigningKey::new(kid, algorithm, decoding_key))
}

/// Pick the verification algorithm for a JWK.
///
/// An explicit asymmetric `alg` wins; otherwise the algorithm follows from
/// the key type and curve.
fn resolve_algorithm(jwk: &Jwk) -> Result<Algorithm, String> {
    if let Some(key_algorithm) = &jwk.common.key_algorithm {
        return match key_algorithm {
            KeyAlgorithm::RS256 => Ok(Algorithm::RS256),
            KeyAlgorithm::RS384 => Ok(Algorithm::RS384),
            KeyAlgorithm::RS512 => Ok(Algorithm::RS512),
            KeyAlgorithm::PS256 => Ok(Algorithm::PS256),
            KeyAlgorithm::PS384 => Ok(Algorithm::PS384),
            KeyAlgorithm::PS512 => Ok(Algorithm::PS512),
            KeyAlgorithm::ES256 => Ok(Algorithm::ES256),
            KeyAlgorithm::ES384 => Ok(Algorithm::ES384),
            KeyAlgorithm::EdDSA => Ok(Algorithm::EdDSA),
            other => Err(format!("unsupported algorithm {:?}", other)),
        };
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            ref curve => Err(format!("unsupported curve {:?}", curve)),
        },
        AlgorithmParameters::OctetKeyPair(params) => match params.curve {
            EllipticCurve::Ed25519 => Ok(Algorithm::EdDSA),
            ref curve => Err(format!("unsupported curve {:?}", curve)),
        },
        AlgorithmParameters::OctetKey(_) => Err("symmetric keys are not accepted".to_string()),
    }
}

/// Build the `kid -> key` mapping, skipping unusable entries.
fn build_key_map(entries: Vec<serde_json::Value>) -> HashMap<String, Arc<SigningKey>> {
    let mut keys = HashMap::with_capacity(entries.len());

    for entry in entries {
        match parse_signing_key(entry) {
            Ok(key) => {
                if keys.contains_key(key.kid()) {
                    tracing::warn!(target: "passage.auth.jwks", kid = %key.kid(), "Duplicate kid in JWKS, keeping first");
                    continue;
                }
                keys.insert(key.kid().to_string(), Arc::new(key));
            }
            Err(reason) => {
                tracing::warn!(target: "passage.auth.jwks", reason = %reason, "Skipping unusable JWK");
            }
        }
    }

    keys
}

/// One fetched key set.
struct CachedKeys {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    /// Cache empty or past its freshness window.
    Stale,
    /// `kid` absent from a fresh cache. Counts against the rate limit.
    UnknownKid,
}

/// Caching, rate-limited store of signing keys.
///
/// Thread-safe; share it behind an `Arc`. Readers clone an `Arc` of the
/// current mapping under a read lock, so lookups never block on a fetch
/// unless they need one.
pub struct KeyStore {
    source: Arc<dyn KeySetSource>,
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<Arc<CachedKeys>>>,
    /// Serializes fetches; holds the error of the last completed attempt.
    refresh_lock: Mutex<Option<KeyStoreError>>,
    /// Completed fetch attempts, successful or not.
    attempts: AtomicU64,
    generation: AtomicU64,
    rate_limiter: InvalidKidRateLimiter,
    cache_ttl: Option<Duration>,
}

impl KeyStore {
    /// Create a store with no freshness window and the default rate limit.
    pub fn new(source: Arc<dyn KeySetSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            rate_limiter: InvalidKidRateLimiter::per_second(
                crate::config::DEFAULT_INVALID_KID_RATE_LIMIT,
            ),
            cache_ttl: None,
        }
    }

    /// Create a store fetching from the configured JWKS URL.
    ///
    /// # Errors
    ///
    /// Returns `KeyStoreError::Retrieval` if the HTTP client cannot be built.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, KeyStoreError> {
        let source = HttpKeySetSource::new(config.jwks_url(), config.jwks_fetch_timeout)?;
        Ok(Self::new(Arc::new(source), clock)
            .with_cache_ttl(config.jwks_cache_ttl)
            .with_invalid_kid_rate_limit(config.invalid_kid_rate_limit))
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Option<Duration>) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Refetches forced by an unknown kid allowed per second. Zero disables
    /// them; first population, expiry and `refresh` are unaffected.
    pub fn with_invalid_kid_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limiter = InvalidKidRateLimiter::per_second(per_second);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: InvalidKidRateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Get a signing key by key ID.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the key is absent after the permitted refetch
    /// - `RateLimited` if the key is absent and the refetch budget is spent
    /// - `Retrieval` if a required fetch failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeyStoreError> {
        if kid.is_empty() || kid.len() > MAX_KID_LENGTH {
            tracing::debug!(target: "passage.auth.jwks", kid_len = kid.len(), "Rejecting kid without lookup");
            metrics::record_key_lookup("not_found");
            return Err(KeyStoreError::NotFound);
        }

        let observed_attempt = self.attempts.load(Ordering::Acquire);
        let snapshot = self.snapshot().await;

        let (observed_generation, reason) = match &snapshot {
            Some(cached) if self.is_fresh(cached) => {
                if let Some(key) = cached.keys.get(kid) {
                    tracing::debug!(target: "passage.auth.jwks", kid = %kid, "JWKS cache hit");
                    metrics::record_key_lookup("hit");
                    return Ok(Arc::clone(key));
                }
                tracing::debug!(target: "passage.auth.jwks", kid = %kid, "Key not found in fresh JWKS cache");
                (Some(cached.generation), RefreshReason::UnknownKid)
            }
            Some(cached) => (Some(cached.generation), RefreshReason::Stale),
            None => (None, RefreshReason::Stale),
        };

        let refreshed = match self
            .refresh_if_unchanged(observed_attempt, observed_generation, reason)
            .await
        {
            Ok(refreshed) => refreshed,
            Err(KeyStoreError::RateLimited) => {
                tracing::warn!(target: "passage.auth.jwks", kid = %kid, "Unknown kid refetch rate limited");
                metrics::record_key_lookup("rate_limited");
                return Err(KeyStoreError::RateLimited);
            }
            Err(e) => {
                metrics::record_key_lookup("error");
                return Err(e);
            }
        };

        match refreshed.keys.get(kid) {
            Some(key) => {
                metrics::record_key_lookup("refetched");
                Ok(Arc::clone(key))
            }
            None => {
                tracing::debug!(target: "passage.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                metrics::record_key_lookup("not_found");
                Err(KeyStoreError::NotFound)
            }
        }
    }

    /// Force a refetch, bypassing the freshness window and the rate limit.
    ///
    /// Returns the number of usable keys in the new set.
    pub async fn refresh(&self) -> Result<usize, KeyStoreError> {
        let mut last_failure = self.refresh_lock.lock().await;
        let cached = self.fetch_and_store(&mut last_failure).await?;
        Ok(cached.keys.len())
    }

    /// Number of keys in the current mapping (fresh or not).
    pub async fn cached_key_count(&self) -> usize {
        self.snapshot()
            .await
            .map(|cached| cached.keys.len())
            .unwrap_or(0)
    }

    /// Whether `kid` is in the current mapping (fresh or not).
    pub async fn is_cached(&self, kid: &str) -> bool {
        self.snapshot()
            .await
            .is_some_and(|cached| cached.keys.contains_key(kid))
    }

    async fn snapshot(&self) -> Option<Arc<CachedKeys>> {
        self.cache.read().await.clone()
    }

    fn is_fresh(&self, cached: &CachedKeys) -> bool {
        match self.cache_ttl {
            None => true,
            Some(ttl) => self.clock.now().saturating_duration_since(cached.fetched_at) < ttl,
        }
    }

    /// Refetch unless another task already completed an attempt after we
    /// looked. A newer fresh generation is reused; a newer failed attempt is
    /// returned as-is so queued waiters do not each hit the source.
    async fn refresh_if_unchanged(
        &self,
        observed_attempt: u64,
        observed_generation: Option<u64>,
        reason: RefreshReason,
    ) -> Result<Arc<CachedKeys>, KeyStoreError> {
        let mut last_failure = self.refresh_lock.lock().await;

        if self.attempts.load(Ordering::Acquire) != observed_attempt {
            if let Some(err) = last_failure.as_ref() {
                tracing::debug!(target: "passage.auth.jwks", error = %err, "Sharing concurrent JWKS fetch failure");
                return Err(err.clone());
            }
            if let Some(current) = self.snapshot().await {
                if Some(current.generation) != observed_generation && self.is_fresh(&current) {
                    tracing::debug!(target: "passage.auth.jwks", generation = current.generation, "Reusing concurrently fetched JWKS");
                    return Ok(current);
                }
            }
        }

        if reason == RefreshReason::UnknownKid && !self.rate_limiter.try_acquire(self.clock.now()) {
            return Err(KeyStoreError::RateLimited);
        }

        self.fetch_and_store(&mut last_failure).await
    }

    /// Fetch the key set and replace the cached mapping, recording the
    /// outcome in `last_failure`. Caller holds `refresh_lock`.
    async fn fetch_and_store(
        &self,
        last_failure: &mut Option<KeyStoreError>,
    ) -> Result<Arc<CachedKeys>, KeyStoreError> {
        let result = self.source.fetch().await;
        self.attempts.fetch_add(1, Ordering::Release);

        let document = match result {
            Ok(document) => {
                *last_failure = None;
                document
            }
            Err(err) => {
                *last_failure = Some(err.clone());
                return Err(err);
            }
        };

        let keys = build_key_map(document.keys);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::info!(
            target: "passage.auth.jwks",
            key_count = keys.len(),
            generation,
            "JWKS cache refreshed"
        );

        let cached = Arc::new(CachedKeys {
            keys,
            fetched_at: self.clock.now(),
            generation,
        });

        let mut cache = self.cache.write().await;
        *cache = Some(Arc::clone(&cached));

        Ok(cached)
    }
}
