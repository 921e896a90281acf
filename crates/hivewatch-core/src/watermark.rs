// ── Watermark ──
//
// Largest event timestamp accepted so far. Never decreases while the
// pipeline runs; an unwritable store leaves the in-memory value ahead
// of the persisted one.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::state::{self, StateStore, keys};

pub struct WatermarkStore {
    current: i64,
    store: Arc<dyn StateStore>,
}

impl WatermarkStore {
    /// Load the persisted watermark, defaulting to 0 when absent or
    /// unreadable.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let current = match state::load_json::<i64>(&*store, keys::WATERMARK) {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "could not read watermark, starting from 0");
                0
            }
        };
        debug!(watermark = current, "watermark loaded");
        Self { current, store }
    }

    pub fn get(&self) -> i64 {
        self.current
    }

    /// Advance to `ts` if it is greater than the current value.
    ///
    /// Returns `Ok(false)` when nothing changed. A persistence error is
    /// returned after the in-memory value has already advanced.
    pub fn advance(&mut self, ts: i64) -> Result<bool, CoreError> {
        if ts <= self.current {
            return Ok(false);
        }
        self.current = ts;
        state::save_json_retrying(&*self.store, keys::WATERMARK, &ts)?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;

    #[test]
    fn starts_at_zero() {
        let watermark = WatermarkStore::load(Arc::new(MemoryStateStore::new()));
        assert_eq!(watermark.get(), 0);
    }

    #[test]
    fn only_moves_forward() {
        let store = Arc::new(MemoryStateStore::new());
        let mut watermark = WatermarkStore::load(store.clone());

        assert!(watermark.advance(1000).unwrap());
        assert!(!watermark.advance(999).unwrap());
        assert!(!watermark.advance(1000).unwrap());
        assert_eq!(watermark.get(), 1000);

        let reloaded = WatermarkStore::load(store);
        assert_eq!(reloaded.get(), 1000);
    }

    #[test]
    fn persist_failure_keeps_memory_value() {
        let store = Arc::new(MemoryStateStore::new());
        let mut watermark = WatermarkStore::load(store.clone());
        store.fail_next_saves(2);

        assert!(watermark.advance(50).is_err());
        assert_eq!(watermark.get(), 50);
        assert_eq!(WatermarkStore::load(store).get(), 0);
    }
}
