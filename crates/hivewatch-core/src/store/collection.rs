// ── Keyed reactive collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels. Snapshots are ordered by key.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection keyed by string id.
///
/// Every mutation rebuilds the snapshot that subscribers receive.
pub(crate) struct Collection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Collection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Clone the stored entity, apply `f`, and store the result.
    /// Returns `false` if the key is absent.
    pub(crate) fn update(&self, key: &str, f: impl FnOnce(&mut T)) -> bool {
        let Some(existing) = self.get(key) else {
            return false;
        };
        let mut entity = (*existing).clone();
        f(&mut entity);
        self.by_key.insert(key.to_owned(), Arc::new(entity));
        self.rebuild_snapshot();
        true
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.by_key.iter().map(|r| r.key().clone()).collect()
    }

    /// Remove every key not in `keep`.
    pub(crate) fn retain_keys(&self, keep: &HashSet<String>) {
        for key in self.keys() {
            if !keep.contains(&key) {
                self.remove(&key);
            }
        }
    }

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
