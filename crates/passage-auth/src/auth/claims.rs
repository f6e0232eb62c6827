//! JWT claims structure.
//!
//! Only the claims the verifier acts on are modeled. Every field is optional
//! so that an absent claim is a validation failure rather than a decoding
//! error. The `sub` field is redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token subject. Passage issues string ids; numeric ids are tolerated.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    Text(String),
    Number(serde_json::Number),
}

impl Subject {
    /// The subject as an identifier, or `None` when empty.
    pub fn to_identifier(&self) -> Option<String> {
        let identifier = match self {
            Subject::Text(text) => text.clone(),
            Subject::Number(number) => number.to_string(),
        };
        Some(identifier).filter(|id| !id.is_empty())
    }
}

/// JWT Claims structure for Passage auth tokens.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (Passage user id) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Subject>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .finish()
    }
}

impl Claims {
    /// The stringified subject, if present and non-empty.
    pub fn subject(&self) -> Option<String> {
        self.sub.as_ref().and_then(Subject::to_identifier)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = Claims {
            sub: Some(Subject::Text("user_secret_123".to_string())),
            exp: Some(1234567890),
            nbf: None,
            iat: Some(1234567800),
        };

        let debug_str = format!("{:?}", claims);

        assert!(
            !debug_str.contains("user_secret_123"),
            "Debug output should not contain actual sub value"
        );
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("1234567890"));
    }

    #[test]
    fn test_claims_deserialize_string_subject() {
        let claims: Claims =
            serde_json::from_str(r#"{"sub":"user_123","exp":1700000000,"iat":1699999000}"#)
                .unwrap();

        assert_eq!(claims.subject(), Some("user_123".to_string()));
        assert_eq!(claims.exp, Some(1700000000));
        assert_eq!(claims.iat, Some(1699999000));
        assert_eq!(claims.nbf, None);
    }

    #[test]
    fn test_claims_deserialize_numeric_subject() {
        let claims: Claims = serde_json::from_str(r#"{"sub":42,"exp":1}"#).unwrap();
        assert_eq!(claims.subject(), Some("42".to_string()));
    }

    #[test]
    fn test_claims_missing_or_empty_subject() {
        let claims: Claims = serde_json::from_str(r#"{"exp":1}"#).unwrap();
        assert_eq!(claims.subject(), None);

        let claims: Claims = serde_json::from_str(r#"{"sub":"","exp":1}"#).unwrap();
        assert_eq!(claims.subject(), None);
    }

    #[test]
    fn test_claims_ignore_unknown_fields() {
        let claims: Claims = serde_json::from_str(
            r#"{"sub":"u","exp":1,"iss":"https://auth.passage.id","aud":["app"],"extra":{"a":1}}"#,
        )
        .unwrap();
        assert_eq!(claims.subject(), Some("u".to_string()));
    }

    #[test]
    fn test_claims_serialization_skips_absent() {
        let claims = Claims {
            sub: Some(Subject::Text("u".to_string())),
            exp: Some(10),
            ..Default::default()
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({"sub": "u", "exp": 10}));
    }
}
