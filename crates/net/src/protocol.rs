//! Wire types for the remote REST service
//!
//! Catalog and user records are shared with `aroma-core`; the types
//! here only cover request and response envelopes.

use std::collections::BTreeSet;

use aroma_core::{UserAccount, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login.
///
/// Roles are optional on the wire; when absent the client asks the
/// profile endpoint instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<BTreeSet<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of an image upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `{ "message": ..., "user": ... }` envelope used by user endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEnvelope<T> {
    #[serde(default)]
    #[allow(dead_code)]
    pub message: Option<String>,
    pub user: T,
}

/// Error body returned by the service
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

pub(crate) type AccountEnvelope = UserEnvelope<UserAccount>;
pub(crate) type ProfileEnvelope = UserEnvelope<UserProfile>;
