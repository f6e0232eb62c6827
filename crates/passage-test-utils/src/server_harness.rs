//! Test server harness for E2E testing
//!
//! Provides TestBackend for spawning the example backend in tests.

use metrics_exporter_prometheus::PrometheusBuilder;
use passage_auth::routes::{build_routes, AppState};
use passage_auth::{Config, Passage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running example backend bound to a random local port.
///
/// # Example
/// ```rust,ignore
/// let server = MockPassageServer::start().await;
/// let backend = TestBackend::spawn(server.config()).await?;
/// let response = reqwest::Client::new()
///     .post(format!("{}/auth", backend.url()))
///     .bearer_auth(token)
///     .send()
///     .await?;
/// ```
pub struct TestBackend {
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestBackend {
    /// Spawn the backend with `config`.
    ///
    /// The metrics handle is not installed globally, so `/metrics` renders
    /// an empty registry and parallel tests do not collide.
    pub async fn spawn(config: Config) -> Result<Self, anyhow::Error> {
        let passage = Passage::new(&config)?;
        Self::spawn_with(config, passage).await
    }

    /// Spawn with a pre-built [`Passage`] (custom key source or clock).
    pub async fn spawn_with(config: Config, passage: Passage) -> Result<Self, anyhow::Error> {
        let state = Arc::new(AppState { config, passage });
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test backend error: {}", e);
            }
        });

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, e.g. `http://127.0.0.1:54321`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
