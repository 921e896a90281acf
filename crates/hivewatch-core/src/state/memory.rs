// In-memory state store, used for ephemeral sessions and tests.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use super::StateStore;
use crate::error::CoreError;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    documents: DashMap<String, String>,
    failing_saves: AtomicU32,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` saves fail, simulating an unavailable disk.
    pub fn fail_next_saves(&self, count: u32) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.documents.get(key).map(|doc| doc.value().clone()))
    }

    fn save(&self, key: &str, document: &str) -> Result<(), CoreError> {
        let failing = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CoreError::persistence(key, "simulated save failure"));
        }
        self.documents.insert(key.to_owned(), document.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.documents.remove(key);
        Ok(())
    }
}
