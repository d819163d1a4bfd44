//! Browser-style key/value storage backed by JSON files
//!
//! `LocalStore` plays the part of `localStorage`: it survives restarts and
//! holds cached widget data plus sections that could not reach the server.
//! `SessionStorage` is scoped to one dashboard session and only carries the
//! page-load marker used for reload detection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::api::ClientError;

/// Session key marking that the dashboard already booted once
pub const PAGE_LOAD_MARKER: &str = "last_page_load";

pub struct LocalStore {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Open (or start) a store persisted at `path`.
    ///
    /// An unreadable or corrupt file starts empty, the same way a browser
    /// treats cleared site data.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                _ => {
                    tracing::warn!(path = %path.display(), "Ignoring unreadable local storage file");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    pub fn memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Map::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), ClientError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut entries = self.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        let mut entries = self.lock();
        entries.clear();
        self.persist(&entries)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        // Readers only ever see a complete file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| ClientError::Storage(format!("{}: {e}", path.display())))
    }
}

/// Per-session storage; ends when the session ends
pub struct SessionStorage {
    store: LocalStore,
}

impl SessionStorage {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn memory() -> Self {
        Self::new(LocalStore::memory())
    }

    /// Record this boot. Returns true when an earlier boot in the same
    /// session already left its marker, i.e. this is a reload.
    pub fn mark_page_load(&self, now: DateTime<Utc>) -> bool {
        let reloaded = self.store.contains(PAGE_LOAD_MARKER);
        if let Err(e) = self
            .store
            .set(PAGE_LOAD_MARKER, Value::from(now.timestamp_millis()))
        {
            tracing::warn!(error = %e, "Failed to write page-load marker");
        }
        reloaded
    }

    /// Forget everything, as closing the tab would
    pub fn end(&self) -> Result<(), ClientError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local-storage.json");

        let store = LocalStore::open(&path);
        store.set("cached_weather", json!({"temp": 72})).unwrap();
        store.set("notes", json!([])).unwrap();
        store.remove("notes").unwrap();

        let reopened = LocalStore::open(&path);
        assert_eq!(reopened.get("cached_weather"), Some(json!({"temp": 72})));
        assert!(!reopened.contains("notes"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");
        fs::write(&path, "not json").unwrap();

        let store = LocalStore::open(&path);
        assert!(store.get("anything").is_none());
        store.set("k", json!(1)).unwrap();
        assert_eq!(LocalStore::open(&path).get("k"), Some(json!(1)));
    }

    #[test]
    fn test_second_boot_is_a_reload() {
        let session = SessionStorage::memory();
        let now = Utc::now();
        assert!(!session.mark_page_load(now));
        assert!(session.mark_page_load(now));

        session.end().unwrap();
        assert!(!session.mark_page_load(now));
    }
}
