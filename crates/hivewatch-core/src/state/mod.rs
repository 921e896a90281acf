// ── Persistent state ──
//
// Key-value document store behind the watermark, the notification log,
// threshold settings, and the background-sync flag. Documents are JSON
// strings written synchronously; callers own the schema.

mod file;
mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::CoreError;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

/// Well-known document keys.
pub mod keys {
    pub const WATERMARK: &str = "watermark";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const THRESHOLDS: &str = "thresholds";
    pub const BACKGROUND_SYNC: &str = "background_sync";
}

/// Durable storage for pipeline documents.
pub trait StateStore: Send + Sync + 'static {
    /// Read a document. `Ok(None)` if it has never been written.
    fn load(&self, key: &str) -> Result<Option<String>, CoreError>;

    fn save(&self, key: &str, document: &str) -> Result<(), CoreError>;

    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Load and decode a JSON document.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, CoreError> {
    let Some(raw) = store.load(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| CoreError::persistence(key, format!("corrupt document: {e}")))
}

/// Encode and save a JSON document.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), CoreError> {
    let document = serde_json::to_string(value).map_err(|e| CoreError::persistence(key, e))?;
    store.save(key, &document)
}

/// Save with a single retry. The caller decides what to do with a
/// second failure; in-memory state is never rolled back.
pub(crate) fn save_json_retrying<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), CoreError> {
    match save_json(store, key, value) {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!(key, error = %first, "state save failed, retrying once");
            save_json(store, key, value)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_through_store() {
        let store = MemoryStateStore::new();
        save_json(&store, keys::WATERMARK, &1234_i64).unwrap();
        assert_eq!(load_json::<i64>(&store, keys::WATERMARK).unwrap(), Some(1234));
        assert_eq!(load_json::<i64>(&store, "missing").unwrap(), None);
    }

    #[test]
    fn corrupt_document_is_persistence_error() {
        let store = MemoryStateStore::new();
        store.save(keys::WATERMARK, "{oops").unwrap();
        let err = load_json::<i64>(&store, keys::WATERMARK).unwrap_err();
        assert!(matches!(err, CoreError::Persistence { key, .. } if key == "watermark"));
    }

    #[test]
    fn retry_recovers_from_one_failure() {
        let store = MemoryStateStore::new();
        store.fail_next_saves(1);
        save_json_retrying(&store, keys::WATERMARK, &5_i64).unwrap();
        assert_eq!(load_json::<i64>(&store, keys::WATERMARK).unwrap(), Some(5));
    }

    #[test]
    fn retry_gives_up_after_second_failure() {
        let store = MemoryStateStore::new();
        store.fail_next_saves(2);
        assert!(save_json_retrying(&store, keys::WATERMARK, &5_i64).is_err());
        assert_eq!(store.load(keys::WATERMARK).unwrap(), None);
    }
}
