//! Remote service contracts
//!
//! The app talks to the server only through these traits. The HTTP
//! implementation lives in [`crate::client`]; tests substitute stubs.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use aroma_core::{
    BrandRecord, CatalogDraft, CategoryRecord, EntityId, EntityKind, NewUser, PasswordChange,
    PerfumeRecord, ProfileUpdate, UserAccount, UserProfile, UserUpdate,
};

use crate::error::Result;
use crate::protocol::{LoginResponse, UploadedFile};

/// Authentication endpoints. Calls take the token explicitly because
/// they run before (or after) the token is installed as the bearer.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    /// `Ok(false)` means the server rejected the token
    async fn validate_token(&self, token: &str) -> Result<bool>;

    /// Best effort; callers ignore failures
    async fn logout(&self, token: &str) -> Result<()>;

    /// Server-issued profile (including roles) for a token
    async fn profile(&self, token: &str) -> Result<UserProfile>;
}

/// Catalog reads and writes
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn categories(&self) -> Result<Vec<CategoryRecord>>;

    async fn brands(&self) -> Result<Vec<BrandRecord>>;

    async fn perfumes(&self) -> Result<Vec<PerfumeRecord>>;

    async fn create(&self, draft: &CatalogDraft) -> Result<()>;

    async fn update(&self, id: EntityId, draft: &CatalogDraft) -> Result<()>;

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()>;
}

/// Image storage
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<UploadedFile>;

    async fn delete_file(&self, filename: &str) -> Result<()>;

    /// Resolve a stored image reference to a URL the UI can load
    fn file_url(&self, reference: &str) -> String;
}

/// User administration and the signed-in user's own account
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserAccount>>;

    async fn create_user(&self, user: &NewUser) -> Result<UserAccount>;

    async fn update_user(&self, id: i64, user: &UserUpdate) -> Result<UserAccount>;

    async fn delete_user(&self, id: i64) -> Result<()>;

    async fn get_profile(&self) -> Result<UserProfile>;

    async fn update_profile(&self, profile: &ProfileUpdate) -> Result<UserProfile>;

    async fn change_password(&self, change: &PasswordChange) -> Result<()>;
}

/// Bearer token shared between the session and the HTTP client.
///
/// The session installs and clears it; every authenticated request
/// reads it.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.token().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_shared() {
        let a = Credentials::new();
        let b = a.clone();
        assert!(!b.is_set());

        a.set(Some("T1".to_string()));
        assert_eq!(b.token().as_deref(), Some("T1"));

        b.set(None);
        assert!(!a.is_set());
    }
}
