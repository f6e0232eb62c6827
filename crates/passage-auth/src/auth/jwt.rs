//! Passage token verification.
//!
//! Verifies tokens against keys served by the [`KeyStore`] and extracts the
//! subject.
//!
//! # Security
//!
//! - Tokens are size-checked before any parsing
//! - The token's `alg` must equal the algorithm bound to the resolved key
//! - `exp` is required; `nbf` and `iat` are checked when present
//! - Every failure collapses into [`InvalidToken`]; reasons are logged at
//!   debug level only

use crate::auth::claims::Claims;
use crate::auth::clock::Clock;
use crate::auth::jwks::{KeyStore, SigningKey};
use crate::errors::{InvalidToken, KeyStoreError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Validation};
use std::sync::Arc;
use tracing::instrument;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size in bytes (8KB).
///
/// Typical Passage tokens are well under 1KB. Larger inputs are rejected
/// before base64 decoding or any key lookup.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

// =============================================================================
// Verifier
// =============================================================================

/// Verifies Passage auth tokens.
pub struct TokenVerifier {
    key_store: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
    leeway_seconds: i64,
}

impl TokenVerifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    ///
    /// * `key_store` - Source of signing keys
    /// * `clock` - Time source for `exp`, `nbf` and `iat`
    /// * `leeway_seconds` - Tolerance applied to every time claim
    pub fn new(key_store: Arc<KeyStore>, clock: Arc<dyn Clock>, leeway_seconds: i64) -> Self {
        Self {
            key_store,
            clock,
            leeway_seconds,
        }
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.key_store
    }

    /// Verify `token` and return the verified claims.
    #[instrument(skip_all)]
    pub async fn verify_claims(&self, token: &str) -> Result<Claims, InvalidToken> {
        let kid = extract_kid(token)?;

        let key = self.key_store.get_key(&kid).await.map_err(|e| {
            match &e {
                KeyStoreError::NotFound => {
                    tracing::debug!(target: "passage.auth.jwt", kid = %kid, "Token rejected: unknown signing key");
                }
                KeyStoreError::RateLimited => {
                    tracing::debug!(target: "passage.auth.jwt", kid = %kid, "Token rejected: unknown signing key (rate limited)");
                }
                KeyStoreError::Retrieval(reason) => {
                    tracing::error!(target: "passage.auth.jwt", error = %reason, "Token rejected: signing keys unavailable");
                }
            }
            InvalidToken
        })?;

        let claims = verify_signature(token, &key)?;
        validate_time_claims_at(&claims, self.clock.unix_timestamp(), self.leeway_seconds)?;

        Ok(claims)
    }

    /// Verify `token` and return its subject.
    pub async fn verify(&self, token: &str) -> Result<String, InvalidToken> {
        let claims = self.verify_claims(token).await?;

        claims.subject().ok_or_else(|| {
            tracing::debug!(target: "passage.auth.jwt", "Token rejected: missing or empty sub");
            InvalidToken
        })
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `kid` from a JWT header without verifying the signature.
///
/// The returned value is only fit for key lookup.
pub fn extract_kid(token: &str) -> Result<String, InvalidToken> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "passage.auth.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(InvalidToken);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "passage.auth.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(InvalidToken);
    }

    let header_part = parts.first().ok_or(InvalidToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "passage.auth.jwt", error = %e, "Failed to decode JWT header base64");
        InvalidToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "passage.auth.jwt", error = %e, "Failed to parse JWT header JSON");
        InvalidToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "passage.auth.jwt", "Token rejected: missing kid");
            InvalidToken
        })
}

/// Check the signature with `key` and decode the claims.
///
/// Only the key's own algorithm is accepted. Time claims are left to
/// [`validate_time_claims_at`].
fn verify_signature(token: &str, key: &SigningKey) -> Result<Claims, InvalidToken> {
    let mut validation = Validation::new(key.algorithm());
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
        tracing::debug!(target: "passage.auth.jwt", kid = %key.kid(), error = ?e.kind(), "Token signature verification failed");
        InvalidToken
    })?;

    Ok(token_data.claims)
}

/// Validate `exp`, `nbf` and `iat` against `now` (Unix seconds).
///
/// - `exp` is required; the token is expired once `now >= exp + leeway`
/// - `nbf` and `iat`, when present, must not exceed `now + leeway`
pub fn validate_time_claims_at(claims: &Claims, now: i64, leeway: i64) -> Result<(), InvalidToken> {
    let exp = claims.exp.ok_or_else(|| {
        tracing::debug!(target: "passage.auth.jwt", "Token rejected: missing exp");
        InvalidToken
    })?;

    if now >= exp.saturating_add(leeway) {
        tracing::debug!(target: "passage.auth.jwt", exp, now, "Token rejected: expired");
        return Err(InvalidToken);
    }

    let latest_allowed = now.saturating_add(leeway);

    if let Some(nbf) = claims.nbf {
        if nbf > latest_allowed {
            tracing::debug!(target: "passage.auth.jwt", nbf, now, "Token rejected: not yet valid");
            return Err(InvalidToken);
        }
    }

    if let Some(iat) = claims.iat {
        if iat > latest_allowed {
            tracing::debug!(target: "passage.auth.jwt", iat, now, "Token rejected: iat in the future");
            return Err(InvalidToken);
        }
    }

    Ok(())
}
