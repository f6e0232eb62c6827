//! Data models for the Passage management API and the example backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Passage user account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Pending,
    /// Any status this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A Passage user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    /// Empty when the user registered with a phone number.
    #[serde(default)]
    pub email: String,

    /// Empty when the user registered with an email address.
    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default)]
    pub phone_verified: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub login_count: u64,

    /// Whether the user has registered a passkey.
    #[serde(default)]
    pub webauthn: bool,

    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl User {
    /// Email if set, otherwise phone.
    pub fn identifier(&self) -> &str {
        if self.email.is_empty() {
            &self.phone
        } else {
            &self.email
        }
    }
}

/// A registered WebAuthn device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(default)]
    pub friendly_name: String,

    #[serde(default)]
    pub cred_id: String,

    #[serde(default)]
    pub usage_count: u64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Passage application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub auth_origin: String,

    #[serde(default)]
    pub redirect_url: String,

    /// Remaining application fields, kept as returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A magic link created for an email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: String,

    pub url: String,

    #[serde(default)]
    pub identifier: String,

    #[serde(default)]
    pub redirect_url: String,

    #[serde(default)]
    pub activated: bool,

    /// Lifetime in minutes.
    #[serde(default)]
    pub ttl: u64,

    #[serde(default)]
    pub user_id: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Request body for creating a user. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl CreateUserRequest {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            phone: None,
        }
    }

    pub fn with_phone(phone: impl Into<String>) -> Self {
        Self {
            email: None,
            phone: Some(phone.into()),
        }
    }

    /// True when neither email nor phone carries a value.
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.email) && blank(&self.phone)
    }
}

/// Request body for updating a user. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
}

/// Request body for creating a magic link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateMagicLinkRequest {
    pub email: String,
    pub redirect_url: String,
}

// Response envelopes returned by the management API.

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesEnvelope {
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppEnvelope {
    pub app: App,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MagicLinkEnvelope {
    pub magic_link: MagicLink,
}

/// Health check response for the example backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub app_id: String,
}

/// Response body for `POST /auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub auth_status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}
