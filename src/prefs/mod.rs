//! Preferences store
//!
//! One single-tenant document of independent sections, persisted through an
//! ordered list of storage tiers:
//!
//! ```text
//!   PreferencesStore ──► [DatabaseBackend?, FileBackend]
//!        │
//!        ├── read(section?)      first tier that answers wins
//!        ├── write(section, v)   whole-section replace, falls through on error
//!        └── merge(section, m)   shallow merge, then write
//! ```
//!
//! The browser-storage tier lives on the client side (`client::local`).

use std::path::PathBuf;

use thiserror::Error;

mod backend;
mod database;
mod document;
mod file;
mod section;
mod store;

pub use backend::{Document, PreferenceBackend};
pub use database::DatabaseBackend;
pub use document::{
    normalize_order, AppearancePreferences, CalendarPreferences, ConcertLocation,
    ConcertPreferences, Message, MotivationEntry, MotivationView, Note, NoteColor,
    PreferenceDocument, TeamKey, TeamPreferences, TeamSet, WidgetId, ACCESS_TOKEN_LIFETIME_SECS,
    DEFAULT_TEAM,
};
pub use file::FileBackend;
pub use section::Section;
pub use store::{motivation_view, redact, PreferencesStore, WriteReceipt, REDACTED};

/// Failures from any storage tier or from section validation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("preference document {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("preference document {path} is not a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("preference row missing after insert")]
    MissingRow,

    #[error("invalid value for section '{section}': {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("no storage tier available")]
    NoTiers,
}

impl StoreError {
    /// Caused by the caller's input rather than by storage
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidSection { .. })
    }
}
