//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs, their JWK form, and token signing.
//! All fixtures are deterministic based on seed values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Deterministic Ed25519 keypair published under a `kid`.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "key-1");
/// server.mount_jwks(vec![keypair.jwk()]).await;
/// let token = keypair.sign(&TestTokenBuilder::new().for_user("usr_1").claims());
/// ```
#[derive(Clone)]
pub struct TestKeypair {
    kid: String,
    seed: [u8; 32],
    public_key: Vec<u8>,
}

impl TestKeypair {
    /// Build the keypair for `seed`. The same seed always produces the same key.
    ///
    /// Panics if ring rejects the seed, which it never does for 32 bytes.
    pub fn new(seed: u8, kid: &str) -> Self {
        Self::try_new(seed, kid).expect("deterministic Ed25519 seed must be accepted")
    }

    pub fn try_new(seed: u8, kid: &str) -> Result<Self, FixtureError> {
        let seed_bytes = seed_bytes(seed);

        // from_seed_unchecked is deterministic and suitable for testing
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;

        Ok(Self {
            kid: kid.to_string(),
            seed: seed_bytes,
            public_key: key_pair.public_key().as_ref().to_vec(),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key as it appears in a JWKS document.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
            "kid": self.kid,
            "use": "sig",
            "alg": "EdDSA",
        })
    }

    /// Same key without `alg`, so the verifier must infer EdDSA from `crv`.
    pub fn jwk_without_alg(&self) -> Value {
        let mut jwk = self.jwk();
        if let Some(object) = jwk.as_object_mut() {
            object.remove("alg");
        }
        jwk
    }

    /// Private key as a PKCS#8 v1 document.
    pub fn pkcs8_der(&self) -> Vec<u8> {
        build_pkcs8_from_seed(&self.seed)
    }

    /// Sign `claims` with this key, `alg = EdDSA` and `kid` set.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, Some(&self.kid))
    }

    /// Sign with an arbitrary (or no) `kid` header.
    pub fn sign_with_kid(&self, claims: &Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = kid.map(str::to_string);

        let key = EncodingKey::from_ed_der(&self.pkcs8_der());
        encode(&header, claims, &key).expect("signing test token must succeed")
    }
}

/// Sign `claims` with HMAC-SHA256 under `kid`.
///
/// Passage never issues symmetric tokens; verifiers must reject these.
pub fn sign_hs256(claims: &Value, kid: &str, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("signing test token must succeed")
}

/// Unsigned token with `alg = none`.
pub fn unsigned_token(claims: &Value, kid: &str) -> String {
    let header = json!({ "alg": "none", "typ": "JWT", "kid": kid });
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// Ring doesn't expose a method to get PKCS#8 from Ed25519KeyPair, so we build it.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER 0, AlgorithmIdentifier { OID 1.3.101.112 },
    //            OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = vec![
        0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04,
        0x20,
    ];
    pkcs8.extend_from_slice(seed);
    pkcs8
}
