//! Local JSON file tier
//!
//! The whole document lives in one pretty-printed JSON file. The directory and
//! the file (with full defaults) are created on first access. A file that
//! exists but does not parse is reported, never overwritten.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use super::backend::{Document, PreferenceBackend};
use super::document::PreferenceDocument;
use super::StoreError;

pub struct FileBackend {
    path: PathBuf,
    default_password: String,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, default_password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_password: default_password.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_or_create(&self) -> Result<Document, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(StoreError::NotAnObject {
                    path: self.path.clone(),
                }),
                Err(source) => Err(StoreError::Malformed {
                    path: self.path.clone(),
                    source,
                }),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = PreferenceDocument::default_map(&self.default_password);
                self.persist(&defaults)?;
                tracing::info!(path = %self.path.display(), "Created preference file with defaults");
                Ok(defaults)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Write via a sibling temp file so readers never see a half-written document
    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let body = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

impl PreferenceBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Document, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.read_or_create()
    }

    fn write_fields(&self, fields: &[(String, Value)]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut doc = self.read_or_create()?;
        for (key, value) in fields {
            doc.insert(key.clone(), value.clone());
        }
        self.persist(&doc)
    }
}
