//! Persistent local storage for Aroma
//!
//! Holds the auth token, current user, session timestamp and catalog
//! snapshot under fixed keys (see [`keys`]).

mod memory;
mod migrations;
mod parse;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use parse::parse_epoch_millis;
pub use sqlite::SqliteStore;
pub use traits::{keys, KeyValueStore};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Read and decode a JSON value.
///
/// Returns `Ok(None)` both when the key is missing and when the stored
/// text does not decode; corrupt state is treated as absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable stored value");
            Ok(None)
        }
    }
}

/// Encode and write a JSON value
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let user = UserProfile::new("admin", None, Default::default());

        save_json(&store, keys::CURRENT_USER, &user).unwrap();
        let loaded: Option<UserProfile> = load_json(&store, keys::CURRENT_USER).unwrap();
        assert_eq!(loaded, Some(user));
    }

    #[test]
    fn test_corrupt_json_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(keys::CURRENT_USER, "{not json").unwrap();

        let loaded: Option<UserProfile> = load_json(&store, keys::CURRENT_USER).unwrap();
        assert!(loaded.is_none());
    }
}
