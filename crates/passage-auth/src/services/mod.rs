//! Passage management API clients.
//!
//! # Components
//!
//! - `api_client` - Authenticated HTTP plumbing and status mapping
//! - `users` - User and device management
//! - `apps` - App info and magic links

pub mod api_client;
pub mod apps;
pub mod users;

pub use api_client::ApiClient;
pub use apps::AppClient;
pub use users::UserClient;
