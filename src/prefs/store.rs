//! Tiered preferences store
//!
//! ```text
//!            read: first tier that answers wins
//!   ┌──────────────┐     ┌──────────────┐
//!   │ database tier│ ──► │  file tier   │
//!   └──────────────┘     └──────────────┘
//!            write: first tier that accepts wins
//! ```
//!
//! The coordinator knows nothing about individual backends beyond their
//! position in the list. A write that lands on a later tier leaves the tiers
//! out of sync; that is counted and logged as divergence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use super::backend::{Document, PreferenceBackend};
use super::database::DatabaseBackend;
use super::document::{MotivationEntry, MotivationView};
use super::file::FileBackend;
use super::section::{Section, MOTIVATION_DATA_KEY, MOTIVATION_DATE_KEY};
use super::StoreError;
use crate::config::StorageConfig;

/// Mask shown instead of OAuth tokens in bulk reads
pub const REDACTED: &str = "***";

/// Where a write ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    pub tier: &'static str,
    pub fell_back: bool,
}

pub struct PreferencesStore {
    tiers: Vec<Arc<dyn PreferenceBackend>>,
    fallback_writes: AtomicU64,
    /// Serializes read-modify-write updates
    update_lock: Mutex<()>,
}

impl PreferencesStore {
    pub fn new(tiers: Vec<Arc<dyn PreferenceBackend>>) -> Self {
        Self {
            tiers,
            fallback_writes: AtomicU64::new(0),
            update_lock: Mutex::new(()),
        }
    }

    /// Build the tier list from config: database (when enabled and reachable), then file
    pub fn from_config(config: &StorageConfig) -> Self {
        let mut tiers: Vec<Arc<dyn PreferenceBackend>> = Vec::new();

        if config.database_enabled {
            match DatabaseBackend::open(
                &config.database_path,
                config.database_pool_size,
                config.default_password.clone(),
            ) {
                Ok(db) => {
                    tracing::info!(path = %config.database_path.display(), "Database tier enabled");
                    tiers.push(Arc::new(db));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Database tier unavailable, continuing with file tier only");
                }
            }
        }

        tiers.push(Arc::new(FileBackend::new(
            config.data_file.clone(),
            config.default_password.clone(),
        )));

        Self::new(tiers)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Writes that could not reach the primary tier since startup
    pub fn fallback_writes(&self) -> u64 {
        self.fallback_writes.load(Ordering::Relaxed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Raw document from the first tier that answers
    pub fn load(&self) -> Result<Document, StoreError> {
        let mut last_error = None;
        for tier in &self.tiers {
            match tier.load() {
                Ok(doc) => return Ok(doc),
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "Preference read failed, trying next tier");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(StoreError::NoTiers))
    }

    /// Bulk read with secrets removed
    pub fn read_all(&self) -> Result<Value, StoreError> {
        Ok(redact(self.load()?))
    }

    /// `{section: value}` (null when absent); motivation is reshaped
    pub fn read_section(&self, section: &Section) -> Result<Value, StoreError> {
        let doc = self.load()?;
        if *section == Section::DailyMotivation {
            return Ok(serde_json::to_value(motivation_view(&doc))?);
        }

        let value = doc.get(section.name()).cloned().unwrap_or(Value::Null);
        let mut out = Map::new();
        out.insert(section.name().to_string(), value);
        Ok(Value::Object(out))
    }

    /// Stored value of one section, null when absent
    pub fn section_value(&self, section: &Section) -> Result<Value, StoreError> {
        let doc = self.load()?;
        if *section == Section::DailyMotivation {
            let view = motivation_view(&doc);
            return Ok(json!({
                "motivation": view.daily_motivation,
                "date": view.daily_motivation_date,
            }));
        }
        Ok(doc.get(section.name()).cloned().unwrap_or(Value::Null))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace one section wholesale
    pub fn write_section(&self, section: &Section, value: Value) -> Result<WriteReceipt, StoreError> {
        let fields = match section {
            Section::DailyMotivation => motivation_fields(value)?,
            _ => vec![(section.name().to_string(), section.normalize(value)?)],
        };
        self.write_fields(section, &fields)
    }

    /// Shallow-merge `updates` into one section
    pub fn merge_section(
        &self,
        section: &Section,
        updates: Map<String, Value>,
    ) -> Result<WriteReceipt, StoreError> {
        self.update_section(section, |current| {
            let mut merged = match current {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            merged.extend(updates);
            Ok(Value::Object(merged))
        })
    }

    /// Read one section, transform it, and write the result back.
    ///
    /// Updates through this method never interleave with each other.
    pub fn update_section<F>(&self, section: &Section, update: F) -> Result<WriteReceipt, StoreError>
    where
        F: FnOnce(Value) -> Result<Value, StoreError>,
    {
        let _guard = self
            .update_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = update(self.section_value(section)?)?;
        self.write_section(section, next)
    }

    fn write_fields(
        &self,
        section: &Section,
        fields: &[(String, Value)],
    ) -> Result<WriteReceipt, StoreError> {
        let mut last_error = None;

        for (position, tier) in self.tiers.iter().enumerate() {
            match tier.write_fields(fields) {
                Ok(()) => {
                    let fell_back = position > 0;
                    if fell_back {
                        self.fallback_writes.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            section = section.name(),
                            tier = tier.name(),
                            divergence = true,
                            "Preference write landed on a fallback tier"
                        );
                    } else {
                        tracing::debug!(section = section.name(), tier = tier.name(), "Preference section written");
                    }
                    return Ok(WriteReceipt {
                        tier: tier.name(),
                        fell_back,
                    });
                }
                Err(e) => {
                    tracing::warn!(tier = tier.name(), section = section.name(), error = %e, "Preference write failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(StoreError::NoTiers))
    }
}

/// Split `{motivation, date}` into the three stored keys
fn motivation_fields(value: Value) -> Result<Vec<(String, Value)>, StoreError> {
    match value {
        Value::Object(map) if map.contains_key("motivation") => {
            let value = Value::Object(map);
            let entry: MotivationEntry = serde_json::from_value(value.clone()).map_err(|e| {
                StoreError::InvalidSection {
                    section: Section::DailyMotivation.name().to_string(),
                    reason: e.to_string(),
                }
            })?;
            Ok(vec![
                (
                    Section::DailyMotivation.name().to_string(),
                    entry.motivation.map(Value::String).unwrap_or(Value::Null),
                ),
                (
                    MOTIVATION_DATE_KEY.to_string(),
                    entry.date.map(Value::String).unwrap_or(Value::Null),
                ),
                (MOTIVATION_DATA_KEY.to_string(), value),
            ])
        }
        Value::String(_) | Value::Null => {
            Ok(vec![(Section::DailyMotivation.name().to_string(), value)])
        }
        _ => Err(StoreError::InvalidSection {
            section: Section::DailyMotivation.name().to_string(),
            reason: "expected {motivation, date}".to_string(),
        }),
    }
}

/// Read shape of the motivation section, preferring the split fields
pub fn motivation_view(doc: &Document) -> MotivationView {
    let combined = doc.get(MOTIVATION_DATA_KEY);
    let pick = |split_key: &str, combined_key: &str| {
        doc.get(split_key)
            .and_then(Value::as_str)
            .or_else(|| combined.and_then(|c| c.get(combined_key)).and_then(Value::as_str))
            .map(str::to_string)
    };

    MotivationView {
        daily_motivation: pick(Section::DailyMotivation.name(), "motivation"),
        daily_motivation_date: pick(MOTIVATION_DATE_KEY, "date"),
    }
}

/// Drop the password and mask OAuth tokens that are present
pub fn redact(mut doc: Document) -> Value {
    doc.remove(Section::Password.name());

    if let Some(Value::Object(calendar)) = doc.get_mut(Section::CalendarPreferences.name()) {
        for key in ["accessToken", "refreshToken"] {
            let present = calendar
                .get(key)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if present {
                calendar.insert(key.to_string(), Value::String(REDACTED.to_string()));
            } else {
                calendar.remove(key);
            }
        }
    }

    Value::Object(doc)
}
