//! Per-category widget data cache
//!
//! ```text
//!   category   ttl      local storage key
//!   weather    30 min   cached_weather
//!   sports     30 min   cached_sports
//!   concerts   60 min   cached_concerts
//! ```
//!
//! Entries are written whole and mirrored to local storage so a restart can
//! reuse them. A reload within the same session throws all of them away
//! before the first fetch; preference sections are not part of this cache.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::local::{LocalStore, SessionStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Weather,
    Sports,
    Concerts,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [Self::Weather, Self::Sports, Self::Concerts];

    pub fn ttl(self) -> Duration {
        match self {
            Self::Weather | Self::Sports => Duration::minutes(30),
            Self::Concerts => Duration::minutes(60),
        }
    }

    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Weather => "cached_weather",
            Self::Sports => "cached_sports",
            Self::Concerts => "cached_concerts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, category: CacheCategory, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < category.ttl()
    }
}

pub struct DataCache {
    entries: HashMap<CacheCategory, CacheEntry>,
    local: Arc<LocalStore>,
}

impl DataCache {
    /// Load whatever local storage still holds
    pub fn load(local: Arc<LocalStore>) -> Self {
        let mut entries = HashMap::new();
        for category in CacheCategory::ALL {
            let Some(raw) = local.get(category.storage_key()) else {
                continue;
            };
            match serde_json::from_value::<CacheEntry>(raw) {
                Ok(entry) => {
                    entries.insert(category, entry);
                }
                Err(e) => {
                    tracing::debug!(key = category.storage_key(), error = %e, "Dropping unreadable cache entry");
                }
            }
        }
        Self { entries, local }
    }

    /// Load for a dashboard boot. On a reload in the same session the widget
    /// caches are discarded so the first render fetches fresh data.
    pub fn boot(local: Arc<LocalStore>, session: &SessionStorage, now: DateTime<Utc>) -> Self {
        let mut cache = Self::load(local);
        if session.mark_page_load(now) {
            tracing::info!("Reload detected, clearing widget caches");
            for category in CacheCategory::ALL {
                cache.invalidate(category);
            }
        }
        cache
    }

    /// Fresh entry for `category`, decoded
    pub fn get<T: DeserializeOwned>(&self, category: CacheCategory, now: DateTime<Utc>) -> Option<T> {
        let entry = self.entries.get(&category)?;
        if !entry.is_fresh(category, now) {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn is_fresh(&self, category: CacheCategory, now: DateTime<Utc>) -> bool {
        self.entries
            .get(&category)
            .is_some_and(|entry| entry.is_fresh(category, now))
    }

    pub fn fetched_at(&self, category: CacheCategory) -> Option<DateTime<Utc>> {
        self.entries.get(&category).map(|entry| entry.fetched_at)
    }

    /// Replace the whole category
    pub fn put<T: Serialize>(&mut self, category: CacheCategory, value: &T, now: DateTime<Utc>) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = category.storage_key(), error = %e, "Cannot cache value");
                return;
            }
        };
        let entry = CacheEntry {
            value,
            fetched_at: now,
        };

        match serde_json::to_value(&entry) {
            Ok(raw) => {
                if let Err(e) = self.local.set(category.storage_key(), raw) {
                    tracing::warn!(key = category.storage_key(), error = %e, "Cache not persisted");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Cache entry not serializable"),
        }
        self.entries.insert(category, entry);
    }

    pub fn invalidate(&mut self, category: CacheCategory) {
        self.entries.remove(&category);
        if let Err(e) = self.local.remove(category.storage_key()) {
            tracing::warn!(key = category.storage_key(), error = %e, "Failed to clear cached data");
        }
    }
}
