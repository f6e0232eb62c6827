//! Token extraction, key management and verification.

pub mod claims;
pub mod clock;
pub mod extractor;
pub mod jwks;
pub mod jwt;
pub mod rate_limit;

pub use claims::{Claims, Subject};
pub use clock::{Clock, SystemClock};
pub use extractor::{extract_token, AuthStrategy, RequestHeaders, AUTH_COOKIE_NAME};
pub use jwks::{HttpKeySetSource, JwksDocument, KeySetSource, KeyStore, SigningKey};
pub use jwt::TokenVerifier;
