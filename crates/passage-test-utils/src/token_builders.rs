//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating token claims.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults: `sub = "usr_test"`, issued now, expiring in one hour.
///
/// # Example
/// ```rust,ignore
/// let token = keypair.sign(
///     &TestTokenBuilder::new()
///         .for_user("usr_alice")
///         .expires_in(300)
///         .claims(),
/// );
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    /// Defaults anchored at `now` instead of the wall clock.
    pub fn at(now: i64) -> Self {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::from("usr_test"));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert(
            "exp".to_string(),
            Value::from(now + Duration::hours(1).num_seconds()),
        );
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", Value::from(subject))
    }

    /// Set a numeric subject
    pub fn for_numeric_user(self, subject: i64) -> Self {
        self.with_claim("sub", Value::from(subject))
    }

    pub fn without_subject(self) -> Self {
        self.without_claim("sub")
    }

    /// Set expiration in seconds from the wall clock
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at(Utc::now().timestamp() + seconds)
    }

    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", Value::from(timestamp))
    }

    pub fn without_expiry(self) -> Self {
        self.without_claim("exp")
    }

    pub fn not_before(self, timestamp: i64) -> Self {
        self.with_claim("nbf", Value::from(timestamp))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", Value::from(timestamp))
    }

    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(self) -> Value {
        Value::Object(self.claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestTokenBuilder::at(1_000).for_user("usr_alice").claims();

        assert_eq!(claims["sub"], "usr_alice");
        assert_eq!(claims["iat"], 1_000);
        assert_eq!(claims["exp"], 4_600);
    }

    #[test]
    fn test_builder_default() {
        let claims = TestTokenBuilder::default().claims();
        assert_eq!(claims["sub"], "usr_test");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_removes_claims() {
        let claims = TestTokenBuilder::new()
            .without_subject()
            .without_expiry()
            .claims();

        assert!(claims.get("sub").is_none());
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_numeric_subject() {
        let claims = TestTokenBuilder::new().for_numeric_user(42).claims();
        assert_eq!(claims["sub"], 42);
    }
}
