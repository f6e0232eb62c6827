//! In-memory key-set source with fetch counting.

use async_trait::async_trait;
use passage_auth::auth::JwksDocument;
use passage_auth::{KeySetSource, KeyStoreError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Key-set source backed by a mutable list of JWKs.
///
/// # Example
/// ```rust,ignore
/// let source = Arc::new(MockKeySource::new(vec![keypair.jwk()]));
/// let store = KeyStore::new(source.clone(), clock);
/// store.get_key("key-1").await?;
/// assert_eq!(source.fetch_count(), 1);
/// ```
pub struct MockKeySource {
    keys: Mutex<Vec<Value>>,
    fetch_count: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockKeySource {
    pub fn new(keys: Vec<Value>) -> Self {
        Self {
            keys: Mutex::new(keys),
            fetch_count: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Hold every fetch for `delay`, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the published keys (key rotation).
    pub fn set_keys(&self, keys: Vec<Value>) {
        *self.keys.lock().unwrap() = keys;
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches attempted, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for MockKeySource {
    async fn fetch(&self) -> Result<JwksDocument, KeyStoreError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(KeyStoreError::Retrieval("mock source unavailable".to_string()));
        }

        Ok(JwksDocument {
            keys: self.keys.lock().unwrap().clone(),
        })
    }
}
