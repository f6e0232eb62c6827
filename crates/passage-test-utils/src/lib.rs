//! # Passage Test Utilities
//!
//! Shared test utilities for `passage-auth`.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys, JWKs, token signing)
//! - Test data builders (TestTokenBuilder)
//! - A manually driven clock (ManualClock)
//! - An in-memory key-set source (MockKeySource)
//! - A wiremock Passage origin (MockPassageServer)
//! - Server test harness (TestBackend for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use passage_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let server = MockPassageServer::start().await;
//!     server.mount_jwks(vec![keypair.jwk()], Some(1)).await;
//!
//!     let token = keypair.sign(&TestTokenBuilder::new().for_user("usr_1").claims());
//!     let authenticator = Authenticator::new(&server.config()).unwrap();
//!     assert_eq!(authenticator.authenticate_token(&token).await.unwrap(), "usr_1");
//! }
//! ```

pub mod clock;
pub mod crypto_fixtures;
pub mod mock_key_source;
pub mod mock_passage;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use clock::*;
pub use crypto_fixtures::*;
pub use mock_key_source::*;
pub use mock_passage::*;
pub use server_harness::*;
pub use token_builders::*;
