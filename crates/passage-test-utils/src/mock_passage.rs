//! Mock Passage origin for JWKS and management API tests.
//!
//! One wiremock server stands in for both the auth origin and the API
//! origin, so a [`Config`] from [`MockPassageServer::config`] points every
//! outbound call at it.

use passage_auth::{Config, SecretString};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// API key accepted by the mocked management endpoints.
pub const TEST_API_KEY: &str = "test-api-key";

/// Application id used by default.
pub const TEST_APP_ID: &str = "test_app_id";

/// Wiremock-backed Passage origin.
///
/// # Example
/// ```rust,ignore
/// let server = MockPassageServer::start().await;
/// server.mount_jwks(vec![keypair.jwk()], Some(1)).await;
/// let passage = Passage::new(&server.config())?;
/// ```
pub struct MockPassageServer {
    server: MockServer,
    app_id: String,
}

impl MockPassageServer {
    pub async fn start() -> Self {
        Self::start_for_app(TEST_APP_ID).await
    }

    pub async fn start_for_app(app_id: &str) -> Self {
        Self {
            server: MockServer::start().await,
            app_id: app_id.to_string(),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Underlying server, for custom mocks and received-request checks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Configuration with both origins pointed at this server.
    pub fn config(&self) -> Config {
        Config::new(self.app_id.clone(), SecretString::from(TEST_API_KEY))
            .expect("test app id must be valid")
            .with_auth_origin(self.uri())
            .with_api_origin(self.uri())
    }

    pub fn jwks_path(&self) -> String {
        format!("/v1/apps/{}/.well-known/jwks.json", self.app_id)
    }

    /// Path of a management endpoint under this app, e.g.
    /// `api_path("/users/usr_1")`.
    pub fn api_path(&self, suffix: &str) -> String {
        format!("/v1/apps/{}{}", self.app_id, suffix)
    }

    /// Serve `keys` as the JWKS document, optionally asserting the number of
    /// fetches when the server drops.
    pub async fn mount_jwks(&self, keys: Vec<Value>, expected_fetches: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })));

        match expected_fetches {
            Some(count) => mock.expect(count).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    /// Serve the JWKS endpoint with a bare status code.
    pub async fn mount_jwks_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer an authenticated management call at `suffix` with `body`.
    pub async fn mount_api(&self, http_method: &str, suffix: &str, status: u16, body: Value) {
        Mock::given(method(http_method))
            .and(path(self.api_path(suffix)))
            .and(header("authorization", format!("Bearer {}", TEST_API_KEY)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `GET /users/{id}` with [`user_json`].
    pub async fn mount_user(&self, user_id: &str, email: &str, phone: &str) {
        self.mount_api(
            "GET",
            &format!("/users/{}", user_id),
            200,
            json!({ "user": user_json(user_id, email, phone) }),
        )
        .await;
    }
}

/// A management API user object.
pub fn user_json(user_id: &str, email: &str, phone: &str) -> Value {
    json!({
        "id": user_id,
        "email": email,
        "phone": phone,
        "status": "active",
        "email_verified": !email.is_empty(),
        "phone_verified": !phone.is_empty(),
        "created_at": "2024-01-15T10:00:00Z",
        "updated_at": "2024-01-16T10:00:00Z",
        "last_login_at": "2024-01-16T10:00:00Z",
        "login_count": 3,
        "webauthn": true,
        "user_metadata": null,
    })
}

/// A management API device object.
pub fn device_json(device_id: &str) -> Value {
    json!({
        "id": device_id,
        "friendly_name": "Chrome on Mac",
        "cred_id": "cred_abc",
        "usage_count": 7,
        "created_at": "2024-01-15T10:00:00Z",
        "updated_at": "2024-01-16T10:00:00Z",
        "last_login_at": null,
    })
}
