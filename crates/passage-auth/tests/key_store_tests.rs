//! Key store integration tests.
//!
//! Drives caching, unknown-kid refetches, the refetch rate limit and
//! single-flight fetching through an in-memory key source and a manual clock.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use futures::future::join_all;
use passage_auth::auth::rate_limit::InvalidKidRateLimiter;
use passage_auth::{KeyStore, KeyStoreError};
use passage_test_utils::{ManualClock, MockKeySource, TestKeypair};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn store_with(source: &Arc<MockKeySource>, clock: &Arc<ManualClock>) -> KeyStore {
    KeyStore::new(source.clone(), clock.clone())
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_first_lookup_fetches_then_serves_from_cache() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    let first = store.get_key("key-1").await.unwrap();
    let second = store.get_key("key-1").await.unwrap();

    assert_eq!(first.kid(), "key-1");
    assert_eq!(second.kid(), "key-1");
    assert_eq!(source.fetch_count(), 1, "Second lookup must be a cache hit");
}

#[tokio::test]
async fn test_unknown_kid_triggers_single_refetch_then_not_found() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    store.get_key("key-1").await.unwrap();
    let result = store.get_key("key-unknown").await;

    assert_eq!(result.unwrap_err(), KeyStoreError::NotFound);
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_rotated_key_is_found_after_refetch() {
    let old_key = TestKeypair::new(1, "key-old");
    let new_key = TestKeypair::new(2, "key-new");
    let source = Arc::new(MockKeySource::new(vec![old_key.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    store.get_key("key-old").await.unwrap();

    source.set_keys(vec![new_key.jwk()]);
    let found = store.get_key("key-new").await.unwrap();

    assert_eq!(found.kid(), "key-new");
    assert_eq!(source.fetch_count(), 2);
    // The refetch replaces the mapping rather than merging into it
    assert!(!store.is_cached("key-old").await);
    assert_eq!(store.cached_key_count().await, 1);
}

#[tokio::test]
async fn test_unusable_keys_are_skipped() {
    let keypair = TestKeypair::new(1, "key-sig");
    let mut enc_key = TestKeypair::new(2, "key-enc").jwk();
    enc_key["use"] = json!("enc");
    let symmetric = json!({ "kty": "oct", "kid": "key-hmac", "alg": "HS256", "k": "c2VjcmV0" });
    let no_kid = json!({ "kty": "OKP", "crv": "Ed25519", "x": "AAAA" });

    let source = Arc::new(MockKeySource::new(vec![
        symmetric,
        enc_key,
        no_kid,
        json!("not an object"),
        keypair.jwk(),
    ]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    assert_eq!(store.refresh().await.unwrap(), 1);
    assert!(store.is_cached("key-sig").await);
    assert!(!store.is_cached("key-enc").await);
    assert!(!store.is_cached("key-hmac").await);
}

#[tokio::test]
async fn test_key_without_alg_is_usable() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk_without_alg()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    let key = store.get_key("key-1").await.unwrap();
    assert_eq!(key.algorithm(), jsonwebtoken::Algorithm::EdDSA);
}

#[tokio::test]
async fn test_oversized_kid_is_rejected_without_fetch() {
    let source = Arc::new(MockKeySource::new(vec![]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    let result = store.get_key(&"k".repeat(65)).await;

    assert_eq!(result.unwrap_err(), KeyStoreError::NotFound);
    assert_eq!(source.fetch_count(), 0);
}

// =============================================================================
// Freshness window
// =============================================================================

#[tokio::test]
async fn test_expired_cache_is_refetched() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock).with_cache_ttl(Some(Duration::from_secs(60)));

    store.get_key("key-1").await.unwrap();
    clock.advance(Duration::from_secs(59));
    store.get_key("key-1").await.unwrap();
    assert_eq!(source.fetch_count(), 1);

    clock.advance(Duration::from_secs(1));
    store.get_key("key-1").await.unwrap();
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_expiry_refetch_is_not_rate_limited() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock)
        .with_cache_ttl(Some(Duration::from_secs(10)))
        .with_invalid_kid_rate_limit(0);

    for _ in 0..3 {
        store.get_key("key-1").await.unwrap();
        clock.advance(Duration::from_secs(10));
    }

    assert_eq!(source.fetch_count(), 3);
}

#[tokio::test]
async fn test_failed_fetch_on_expired_cache_fails_closed() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock).with_cache_ttl(Some(Duration::from_secs(60)));

    store.get_key("key-1").await.unwrap();
    source.set_failing(true);
    clock.advance(Duration::from_secs(61));

    let result = store.get_key("key-1").await;
    assert!(matches!(result, Err(KeyStoreError::Retrieval(_))));
}

#[tokio::test]
async fn test_failed_first_fetch_is_retrieval_error() {
    let source = Arc::new(MockKeySource::new(vec![]));
    source.set_failing(true);
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    let result = store.get_key("key-1").await;

    assert!(matches!(result, Err(KeyStoreError::Retrieval(_))));
    assert_eq!(store.cached_key_count().await, 0);
}

// =============================================================================
// Unknown-kid rate limit
// =============================================================================

#[tokio::test]
async fn test_unknown_kid_refetches_are_rate_limited() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    // Initial population is not a miss-forced refetch
    store.get_key("key-1").await.unwrap();
    assert_eq!(source.fetch_count(), 1);

    for i in 0..10 {
        let result = store.get_key(&format!("unknown-{}", i)).await;
        assert_eq!(result.unwrap_err(), KeyStoreError::NotFound);
    }
    assert_eq!(source.fetch_count(), 11);

    let result = store.get_key("unknown-10").await;
    assert_eq!(result.unwrap_err(), KeyStoreError::RateLimited);
    assert_eq!(source.fetch_count(), 11, "Rate-limited lookup must not fetch");

    // Known keys are still served while the budget is spent
    assert_eq!(store.get_key("key-1").await.unwrap().kid(), "key-1");
}

#[tokio::test]
async fn test_rate_limit_resets_after_window() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock).with_invalid_kid_rate_limit(2);

    store.get_key("key-1").await.unwrap();
    store.get_key("unknown-a").await.unwrap_err();
    store.get_key("unknown-b").await.unwrap_err();
    assert_eq!(
        store.get_key("unknown-c").await.unwrap_err(),
        KeyStoreError::RateLimited
    );

    clock.advance(Duration::from_secs(1));

    assert_eq!(
        store.get_key("unknown-c").await.unwrap_err(),
        KeyStoreError::NotFound
    );
    assert_eq!(source.fetch_count(), 4);
}

#[tokio::test]
async fn test_custom_rate_limiter_window() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock)
        .with_rate_limiter(InvalidKidRateLimiter::new(1, Duration::from_secs(10)));

    store.get_key("key-1").await.unwrap();
    store.get_key("unknown-a").await.unwrap_err();

    clock.advance(Duration::from_secs(5));
    assert_eq!(
        store.get_key("unknown-b").await.unwrap_err(),
        KeyStoreError::RateLimited
    );

    clock.advance(Duration::from_secs(5));
    assert_eq!(
        store.get_key("unknown-b").await.unwrap_err(),
        KeyStoreError::NotFound
    );
}

#[tokio::test]
async fn test_manual_refresh_bypasses_rate_limit() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock).with_invalid_kid_rate_limit(0);

    assert_eq!(store.refresh().await.unwrap(), 1);
    assert_eq!(store.refresh().await.unwrap(), 1);
    assert_eq!(source.fetch_count(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_cold_lookups_share_one_fetch() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(
        MockKeySource::new(vec![keypair.jwk()]).with_delay(Duration::from_millis(50)),
    );
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(store_with(&source, &clock));

    let lookups = (0..16).map(|_| {
        let store = Arc::clone(&store);
        async move { store.get_key("key-1").await }
    });
    let results = join_all(lookups).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_concurrent_unknown_kid_lookups_share_refetch() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(
        MockKeySource::new(vec![keypair.jwk()]).with_delay(Duration::from_millis(20)),
    );
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(store_with(&source, &clock));

    store.get_key("key-1").await.unwrap();

    let rotated = TestKeypair::new(2, "key-2");
    source.set_keys(vec![keypair.jwk(), rotated.jwk()]);

    let lookups = (0..8).map(|_| {
        let store = Arc::clone(&store);
        async move { store.get_key("key-2").await }
    });
    let results = join_all(lookups).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(
        source.fetch_count() < 1 + 8,
        "Waiters must reuse the in-flight refetch"
    );
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_concurrent_cold_lookups_share_failed_fetch() {
    let source = Arc::new(MockKeySource::new(vec![]).with_delay(Duration::from_millis(200)));
    source.set_failing(true);
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(store_with(&source, &clock));

    let started = std::time::Instant::now();
    let lookups = (0..10).map(|_| {
        let store = Arc::clone(&store);
        async move { store.get_key("key-1").await }
    });
    let results = join_all(lookups).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(KeyStoreError::Retrieval(_)))));
    assert_eq!(
        source.fetch_count(),
        1,
        "Waiters must share the failed fetch instead of retrying it"
    );
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_lookup_after_failed_fetch_retries() {
    let keypair = TestKeypair::new(1, "key-1");
    let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
    source.set_failing(true);
    let clock = Arc::new(ManualClock::new());
    let store = store_with(&source, &clock);

    let result = store.get_key("key-1").await;
    assert!(matches!(result, Err(KeyStoreError::Retrieval(_))));

    source.set_failing(false);

    assert!(store.get_key("key-1").await.is_ok());
    assert_eq!(source.fetch_count(), 2);
}
