//! `Passage` bundles request authentication with the management clients.

use crate::auth::extractor::RequestHeaders;
use crate::authenticator::Authenticator;
use crate::config::Config;
use crate::errors::{ApiError, AuthError};
use crate::models::{App, CreateMagicLinkRequest, MagicLink};
use crate::services::{ApiClient, AppClient, UserClient};
use std::sync::Arc;

/// Entry point for a single Passage application.
///
/// The API key only reaches the management clients; request authentication
/// needs nothing but the public JWKS.
#[derive(Clone)]
pub struct Passage {
    app_id: String,
    authenticator: Arc<Authenticator>,
    apps: AppClient,
    users: UserClient,
}

impl Passage {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if the JWKS or management HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let authenticator =
            Authenticator::new(config).map_err(|e| ApiError::Internal(e.to_string()))?;
        Self::with_authenticator(config, Arc::new(authenticator))
    }

    /// Build with a pre-constructed authenticator (custom key source or clock).
    pub fn with_authenticator(
        config: &Config,
        authenticator: Arc<Authenticator>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::from_config(config)?;

        Ok(Self {
            app_id: config.app_id.clone(),
            authenticator,
            apps: AppClient::new(api.clone()),
            users: UserClient::new(api),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    /// Authenticate a request and return the verified user id.
    pub async fn authenticate_request<R>(&self, request: &R) -> Result<String, AuthError>
    where
        R: RequestHeaders + Sync + ?Sized,
    {
        self.authenticator.authenticate_request(request).await
    }

    /// Fetch this application's settings.
    pub async fn get_app(&self) -> Result<App, ApiError> {
        self.apps.get_app().await
    }

    /// Create a magic link for `email`.
    pub async fn create_magic_link(
        &self,
        email: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Result<MagicLink, ApiError> {
        let request = CreateMagicLinkRequest {
            email: email.into(),
            redirect_url: redirect_url.into(),
        };
        self.apps.create_magic_link(&request).await
    }

    /// User management.
    pub fn user(&self) -> &UserClient {
        &self.users
    }
}
