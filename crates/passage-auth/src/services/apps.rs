//! Passage application endpoints: app info and magic links.

use crate::errors::ApiError;
use crate::models::{App, AppEnvelope, CreateMagicLinkRequest, MagicLink, MagicLinkEnvelope};
use crate::services::api_client::{ApiClient, Operation};
use reqwest::Method;
use tracing::instrument;

const GET_APP: Operation = Operation {
    name: "get_app",
    resource: "App",
};
const CREATE_MAGIC_LINK: Operation = Operation {
    name: "create_magic_link",
    resource: "Magic link",
};

/// Client for application-level endpoints.
#[derive(Clone)]
pub struct AppClient {
    api: ApiClient,
}

impl AppClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch the application's settings.
    #[instrument(skip_all)]
    pub async fn get_app(&self) -> Result<App, ApiError> {
        let envelope: AppEnvelope = self.api.get_json(GET_APP, &[]).await?;
        Ok(envelope.app)
    }

    /// Create a magic link that signs `email` in and redirects to
    /// `redirect_url`.
    #[instrument(skip_all)]
    pub async fn create_magic_link(
        &self,
        request: &CreateMagicLinkRequest,
    ) -> Result<MagicLink, ApiError> {
        if request.email.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "email is required to create a magic link".to_string(),
            ));
        }

        let envelope: MagicLinkEnvelope = self
            .api
            .send_json(CREATE_MAGIC_LINK, Method::POST, &["magic-links"], request)
            .await?;
        Ok(envelope.magic_link)
    }
}
