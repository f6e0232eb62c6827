//! Authenticated HTTP client for the Passage management API.
//!
//! Shared by [`UserClient`](super::users::UserClient) and
//! [`AppClient`](super::apps::AppClient).
//!
//! # Security
//!
//! - Requests carry `Authorization: Bearer <api key>`; the key is held in a
//!   `SecretString` and never logged
//! - Caller-supplied ids are percent-encoded as single path segments
//! - Upstream error bodies are logged, never returned to callers

use crate::config::Config;
use crate::errors::ApiError;
use crate::observability::metrics;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Default timeout for management API requests in seconds.
const API_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Names a management call for logs, metrics and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Metric label, e.g. `get_user`.
    pub name: &'static str,
    /// Resource named in `NotFound` / `BadRequest` messages.
    pub resource: &'static str,
}

/// HTTP client for one application's management endpoints.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// `{api_origin}/v1/apps/{app_id}`.
    base_url: Url,

    /// Passage API key.
    api_key: SecretString,
}

impl ApiClient {
    /// Create a new management API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Application base URL (e.g., "https://api.passage.id/v1/apps/app_123")
    /// * `api_key` - Passage API key
    ///
    /// # Errors
    ///
    /// - `ApiError::InvalidInput` if `base_url` is not an absolute URL
    /// - `ApiError::Internal` if the HTTP client cannot be built
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ApiError::InvalidInput(format!("invalid API base URL '{}': {}", base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidInput(format!(
                "API base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(API_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "passage.services.api", error = %e, "Failed to build HTTP client");
                ApiError::Internal("failed to build HTTP client".to_string())
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a client for the configured application.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url(), config.api_key.clone())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build `{base_url}/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Internal("API base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET and decode the JSON body.
    pub async fn get_json<T>(&self, op: Operation, segments: &[&str]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let response = self.send(op, self.client.request(Method::GET, url)).await?;
        decode_json(op, response).await
    }

    /// Send `body` as JSON with `method` and decode the JSON response.
    pub async fn send_json<B, T>(
        &self,
        op: Operation,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let response = self
            .send(op, self.client.request(method, url).json(body))
            .await?;
        decode_json(op, response).await
    }

    /// Send a body-less request with `method` and decode the JSON response.
    pub async fn send_empty<T>(
        &self,
        op: Operation,
        method: Method,
        segments: &[&str],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let response = self.send(op, self.client.request(method, url)).await?;
        decode_json(op, response).await
    }

    /// DELETE; any 2xx is success and the body is ignored.
    pub async fn delete(&self, op: Operation, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.endpoint(segments)?;
        self.send(op, self.client.request(Method::DELETE, url))
            .await
            .map(|_| ())
    }

    /// Attach credentials, send, record metrics and map non-2xx statuses.
    async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response, ApiError> {
        let start = Instant::now();

        let result = request
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let status = if e.is_timeout() { "timeout" } else { "error" };
                metrics::record_api_request(op.name, status, start.elapsed());
                warn!(target: "passage.services.api", operation = op.name, error = %e, "Passage API request failed");
                return Err(ApiError::Transport(e.to_string()));
            }
        };

        let status_label = if response.status().is_success() {
            "success"
        } else {
            "error"
        };
        metrics::record_api_request(op.name, status_label, start.elapsed());

        handle_status(op, response).await
    }
}

/// Map an upstream status to `ApiError`.
async fn handle_status(op: Operation, response: Response) -> Result<Response, ApiError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!(target: "passage.services.api", operation = op.name, status = %status, "Passage API key rejected");
            Err(ApiError::Unauthorized)
        }
        StatusCode::NOT_FOUND => {
            tracing::debug!(target: "passage.services.api", operation = op.name, body = %error_body, "Passage API returned not found");
            Err(ApiError::NotFound(format!("{} not found", op.resource)))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            warn!(target: "passage.services.api", operation = op.name, status = %status, body = %error_body, "Passage API returned bad request");
            Err(ApiError::BadRequest(format!("Invalid {} request", op.resource)))
        }
        _ => {
            warn!(target: "passage.services.api", operation = op.name, status = %status, body = %error_body, "Unexpected Passage API response");
            Err(ApiError::Upstream(status.as_u16()))
        }
    }
}

async fn decode_json<T>(op: Operation, response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    response.json().await.map_err(|e| {
        error!(target: "passage.services.api", operation = op.name, error = %e, "Failed to parse Passage API response");
        ApiError::Decode(e.to_string())
    })
}

/// Reject caller-supplied ids that cannot name a single path segment.
///
/// `.` and `..` are dropped by URL path normalization, which would retarget
/// the request at the parent collection.
pub(crate) fn require_id(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} must not be empty", name)));
    }
    if value == "." || value == ".." {
        return Err(ApiError::InvalidInput(format!("{} is not a valid id", name)));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(
            "https://api.passage.id/v1/apps/app_123",
            SecretString::from("sk_test"),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let url = client().endpoint(&["users", "usr_1", "devices"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.passage.id/v1/apps/app_123/users/usr_1/devices"
        );
    }

    #[test]
    fn test_endpoint_percent_encodes_segments() {
        let url = client().endpoint(&["users", "../admin?x=1#frag"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.passage.id/v1/apps/app_123/users/..%2Fadmin%3Fx=1%23frag"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let client = ApiClient::new(
            "https://api.passage.id/v1/apps/app_123/",
            SecretString::from("sk_test"),
        )
        .unwrap();

        let url = client.endpoint(&["users"]).unwrap();
        assert_eq!(url.as_str(), "https://api.passage.id/v1/apps/app_123/users");
    }

    #[test]
    fn test_endpoint_with_no_segments_is_base() {
        let url = client().endpoint(&[]).unwrap();
        assert_eq!(url.as_str(), "https://api.passage.id/v1/apps/app_123");
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let result = ApiClient::new("not a url", SecretString::from("sk_test"));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));

        let result = ApiClient::new("mailto:someone@example.com", SecretString::from("sk_test"));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_require_id() {
        assert!(require_id("usr_1", "user id").is_ok());
        assert!(matches!(
            require_id("  ", "user id"),
            Err(ApiError::InvalidInput(msg)) if msg == "user id must not be empty"
        ));
        assert!(matches!(
            require_id("..", "user id"),
            Err(ApiError::InvalidInput(_))
        ));
    }
}
