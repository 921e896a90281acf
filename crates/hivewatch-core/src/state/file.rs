// ── File-backed state store ──
//
// One `<key>.json` file per document under a state directory. Writes go
// to a sibling temp file first and are renamed into place, so a crash
// mid-write leaves the previous document intact. On a multi-thread
// runtime the file I/O runs under `block_in_place` so a slow disk does not
// stall the other tasks on the calling worker.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use super::StateStore;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::persistence(key, "invalid state key"));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

// `block_in_place` panics on a current-thread runtime, so those callers
// (and callers outside any runtime) run the closure inline.
fn blocking_io<T>(io: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(io)
        }
        _ => io(),
    }
}

impl StateStore for FileStateStore {
    fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        let path = self.path_for(key)?;
        match blocking_io(|| fs::read_to_string(&path)) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::persistence(key, e)),
        }
    }

    fn save(&self, key: &str, document: &str) -> Result<(), CoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        blocking_io(|| {
            fs::create_dir_all(&self.root)?;
            fs::write(&tmp, document)?;
            fs::rename(&tmp, &path)
        })
        .map_err(|e| CoreError::persistence(key, e))?;

        debug!(path = %path.display(), "saved state document");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let path = self.path_for(key)?;
        match blocking_io(|| fs::remove_file(&path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::persistence(key, e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));

        assert_eq!(store.load("watermark").unwrap(), None);

        store.save("watermark", "1001").unwrap();
        assert_eq!(store.load("watermark").unwrap().as_deref(), Some("1001"));
        assert!(dir.path().join("state/watermark.json").exists());
        assert!(!dir.path().join("state/watermark.json.tmp").exists());

        store.save("watermark", "2002").unwrap();
        assert_eq!(store.load("watermark").unwrap().as_deref(), Some("2002"));

        store.remove("watermark").unwrap();
        assert_eq!(store.load("watermark").unwrap(), None);
        store.remove("watermark").unwrap();
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.save("../escape", "x").is_err());
        assert!(store.load("").is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn saves_from_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));

        store.save("notifications", "[]").unwrap();
        assert_eq!(store.load("notifications").unwrap().as_deref(), Some("[]"));
        store.remove("notifications").unwrap();
        assert_eq!(store.load("notifications").unwrap(), None);
    }

    #[tokio::test]
    async fn saves_from_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));

        store.save("watermark", "7").unwrap();
        assert_eq!(store.load("watermark").unwrap().as_deref(), Some("7"));
    }
}
