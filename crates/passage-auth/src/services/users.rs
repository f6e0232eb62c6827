//! Passage user management.
//!
//! Wraps the `/users` endpoints of the management API. User ids come from
//! verified tokens or from callers; both are treated as opaque path segments.

use crate::errors::ApiError;
use crate::models::{
    CreateUserRequest, Device, DevicesEnvelope, UpdateUserRequest, User, UserEnvelope,
};
use crate::services::api_client::{require_id, ApiClient, Operation};
use reqwest::Method;
use tracing::instrument;

const GET_USER: Operation = Operation {
    name: "get_user",
    resource: "User",
};
const CREATE_USER: Operation = Operation {
    name: "create_user",
    resource: "User",
};
const UPDATE_USER: Operation = Operation {
    name: "update_user",
    resource: "User",
};
const ACTIVATE_USER: Operation = Operation {
    name: "activate_user",
    resource: "User",
};
const DEACTIVATE_USER: Operation = Operation {
    name: "deactivate_user",
    resource: "User",
};
const DELETE_USER: Operation = Operation {
    name: "delete_user",
    resource: "User",
};
const LIST_DEVICES: Operation = Operation {
    name: "list_devices",
    resource: "User",
};
const REVOKE_DEVICE: Operation = Operation {
    name: "revoke_device",
    resource: "Device",
};

/// Client for user management endpoints.
#[derive(Clone)]
pub struct UserClient {
    api: ApiClient,
}

impl UserClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// - `ApiError::NotFound` if the user does not exist
    /// - `ApiError::InvalidInput` if `user_id` is empty
    #[instrument(skip_all)]
    pub async fn get(&self, user_id: &str) -> Result<User, ApiError> {
        require_id(user_id, "user id")?;
        let envelope: UserEnvelope = self.api.get_json(GET_USER, &["users", user_id]).await?;
        Ok(envelope.user)
    }

    /// Create a user with an email address or phone number.
    #[instrument(skip_all)]
    pub async fn create(&self, request: &CreateUserRequest) -> Result<User, ApiError> {
        if request.is_empty() {
            return Err(ApiError::InvalidInput(
                "either email or phone is required to create a user".to_string(),
            ));
        }

        let envelope: UserEnvelope = self
            .api
            .send_json(CREATE_USER, Method::POST, &["users"], request)
            .await?;

        tracing::info!(target: "passage.services.api", "Passage user created");
        Ok(envelope.user)
    }

    /// Update a user's email, phone or metadata.
    #[instrument(skip_all)]
    pub async fn update(&self, user_id: &str, request: &UpdateUserRequest) -> Result<User, ApiError> {
        require_id(user_id, "user id")?;
        let envelope: UserEnvelope = self
            .api
            .send_json(UPDATE_USER, Method::PATCH, &["users", user_id], request)
            .await?;
        Ok(envelope.user)
    }

    /// Re-enable a deactivated user.
    #[instrument(skip_all)]
    pub async fn activate(&self, user_id: &str) -> Result<User, ApiError> {
        require_id(user_id, "user id")?;
        let envelope: UserEnvelope = self
            .api
            .send_empty(ACTIVATE_USER, Method::PATCH, &["users", user_id, "activate"])
            .await?;
        Ok(envelope.user)
    }

    /// Prevent a user from logging in.
    #[instrument(skip_all)]
    pub async fn deactivate(&self, user_id: &str) -> Result<User, ApiError> {
        require_id(user_id, "user id")?;
        let envelope: UserEnvelope = self
            .api
            .send_empty(
                DEACTIVATE_USER,
                Method::PATCH,
                &["users", user_id, "deactivate"],
            )
            .await?;
        Ok(envelope.user)
    }

    /// Delete a user.
    #[instrument(skip_all)]
    pub async fn delete(&self, user_id: &str) -> Result<(), ApiError> {
        require_id(user_id, "user id")?;
        self.api.delete(DELETE_USER, &["users", user_id]).await?;
        tracing::info!(target: "passage.services.api", "Passage user deleted");
        Ok(())
    }

    /// List a user's registered devices.
    #[instrument(skip_all)]
    pub async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, ApiError> {
        require_id(user_id, "user id")?;
        let envelope: DevicesEnvelope = self
            .api
            .get_json(LIST_DEVICES, &["users", user_id, "devices"])
            .await?;
        Ok(envelope.devices)
    }

    /// Revoke one of a user's devices.
    #[instrument(skip_all)]
    pub async fn revoke_device(&self, user_id: &str, device_id: &str) -> Result<(), ApiError> {
        require_id(user_id, "user id")?;
        require_id(device_id, "device id")?;
        self.api
            .delete(REVOKE_DEVICE, &["users", user_id, "devices", device_id])
            .await
    }
}
