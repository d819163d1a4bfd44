use serde_json::{Map, Value};

use super::StoreError;

/// Raw preference document keyed by storage key
pub type Document = Map<String, Value>;

/// One storage tier of the preferences store.
///
/// Implementations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait PreferenceBackend: Send + Sync {
    /// Short label for logs and the health endpoint
    fn name(&self) -> &'static str;

    /// Load the whole document, creating it with defaults on first access
    fn load(&self) -> Result<Document, StoreError>;

    /// Persist the given top-level keys, leaving every other key untouched
    fn write_fields(&self, fields: &[(String, Value)]) -> Result<(), StoreError>;
}
