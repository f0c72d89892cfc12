//! Storage traits
//!
//! The client keeps its durable state as string values under fixed
//! keys, so one small trait covers every backend (SQLite, memory).

use crate::error::Result;

/// Durable string key-value store
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove several values
    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Fixed store keys. The names match what earlier clients wrote, so
/// state survives upgrades.
pub mod keys {
    /// Bearer token of the signed-in user
    pub const AUTH_TOKEN: &str = "authToken";
    /// JSON-serialized [`UserProfile`](crate::models::UserProfile)
    pub const CURRENT_USER: &str = "adminUser";
    /// Last qualifying activity, epoch millis as a decimal string
    pub const SESSION_STARTED_AT: &str = "sessionStartTime";
    /// JSON-serialized [`CatalogSnapshot`](crate::snapshot::CatalogSnapshot)
    pub const CATALOG_SNAPSHOT: &str = "perfumeCatalogData";

    /// Every key owned by the session
    pub const SESSION_KEYS: &[&str] = &[AUTH_TOKEN, CURRENT_USER, SESSION_STARTED_AT];
}
