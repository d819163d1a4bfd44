//! In-memory preference state with optimistic writes
//!
//! ```text
//!   mutate ──► memory (immediately) ──► POST /preferences
//!                                          │ failure
//!                                          ▼
//!                                    local storage
//! ```
//!
//! Memory is never rolled back: the user keeps seeing what they chose even
//! while the server is unreachable, and local storage carries it until the
//! next successful boot.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::api::{ClientError, DashboardApi};
use super::local::LocalStore;
use super::motivation;
use crate::prefs::{
    AppearancePreferences, CalendarPreferences, ConcertPreferences, Message, MotivationEntry,
    MotivationView, Note, NoteColor, Section, TeamKey, TeamPreferences,
};

/// Local storage keys for the motivation fallback
const MOTIVATION_KEY: &str = "daily-motivation";
const MOTIVATION_DATE_KEY: &str = "daily-motivation-date";

/// Every section the dashboard renders from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesState {
    pub team: TeamPreferences,
    pub appearance: AppearancePreferences,
    pub concerts: ConcertPreferences,
    pub calendar: CalendarPreferences,
    pub messages: Vec<Message>,
    pub notes: Vec<Note>,
    pub motivation: MotivationView,
}

fn section_or_default<T: DeserializeOwned + Default>(doc: &Map<String, Value>, key: &str) -> T {
    match doc.get(key) {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!(section = key, error = %e, "Unreadable section, using defaults");
            T::default()
        }),
        _ => T::default(),
    }
}

impl PreferencesState {
    /// Build from a (redacted) preference document
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        Self {
            team: section_or_default(doc, Section::TeamPreferences.name()),
            appearance: section_or_default(doc, Section::AppearancePreferences.name()),
            concerts: section_or_default(doc, Section::ConcertPreferences.name()),
            calendar: section_or_default(doc, Section::CalendarPreferences.name()),
            messages: section_or_default(doc, Section::Messages.name()),
            notes: section_or_default(doc, Section::Notes.name()),
            motivation: MotivationView {
                daily_motivation: doc.get("dailyMotivation").and_then(Value::as_str).map(str::to_string),
                daily_motivation_date: doc
                    .get("dailyMotivationDate")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        }
    }

    /// Sections that local storage still holds from failed writes
    pub fn from_local(local: &LocalStore) -> Self {
        let mut doc = Map::new();
        for section in [
            Section::TeamPreferences,
            Section::AppearancePreferences,
            Section::ConcertPreferences,
            Section::CalendarPreferences,
            Section::Messages,
            Section::Notes,
        ] {
            if let Some(value) = local.get(section.name()) {
                doc.insert(section.name().to_string(), value);
            }
        }
        if let Some(value) = local.get(MOTIVATION_KEY) {
            doc.insert("dailyMotivation".to_string(), value);
        }
        if let Some(value) = local.get(MOTIVATION_DATE_KEY) {
            doc.insert("dailyMotivationDate".to_string(), value);
        }
        Self::from_document(&doc)
    }

    pub fn unread_messages(&self) -> usize {
        self.messages.iter().filter(|m| !m.read).count()
    }
}

/// Client-side view of the preference document
pub struct Session {
    api: Arc<dyn DashboardApi>,
    local: Arc<LocalStore>,
    state: Mutex<PreferencesState>,
}

impl Session {
    /// Startup load: server document (plus real calendar tokens), else local
    /// storage. Legacy team keys and stale widget orders are repaired and
    /// the repaired sections written back.
    pub async fn load(api: Arc<dyn DashboardApi>, local: Arc<LocalStore>) -> Self {
        let state = match Self::fetch(api.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Server unreachable, using locally stored preferences");
                PreferencesState::from_local(&local)
            }
        };

        let session = Self {
            api,
            local,
            state: Mutex::new(state),
        };

        let team_changed = session.lock().team.reshape_legacy();
        if team_changed {
            tracing::info!("Cleared team selection saved before composite keys");
            session.persist(&Section::TeamPreferences).await;
        }
        let order_changed = session.lock().appearance.normalize();
        if order_changed {
            session.persist(&Section::AppearancePreferences).await;
        }

        session
    }

    async fn fetch(api: &dyn DashboardApi) -> Result<PreferencesState, ClientError> {
        let doc = match api.preferences().await? {
            Value::Object(map) => map,
            other => {
                return Err(ClientError::Decode(format!(
                    "preferences are not an object: {other}"
                )))
            }
        };
        let mut state = PreferencesState::from_document(&doc);

        // Bulk reads mask tokens; the calendar section carries the real ones
        match api.section(Section::CalendarPreferences.name()).await {
            Ok(value) if !value.is_null() => match serde_json::from_value(value) {
                Ok(calendar) => state.calendar = calendar,
                Err(e) => tracing::warn!(error = %e, "Unreadable calendar preferences"),
            },
            Ok(_) => {}
            Err(e) => {
                // Masked tokens must never reach a save
                tracing::warn!(error = %e, "Failed to load calendar preferences, treating account as disconnected");
                state.calendar.disconnect();
            }
        }
        Ok(state)
    }

    fn lock(&self) -> MutexGuard<'_, PreferencesState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PreferencesState {
        self.lock().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&PreferencesState) -> T) -> T {
        f(&self.lock())
    }

    /// Apply `mutate` in memory, then persist `section`
    pub async fn update<T>(&self, section: Section, mutate: impl FnOnce(&mut PreferencesState) -> T) -> T {
        let result = mutate(&mut self.lock());
        self.persist(&section).await;
        result
    }

    fn section_value(&self, section: &Section) -> Option<Value> {
        fn encode<T: Serialize>(value: &T) -> Option<Value> {
            serde_json::to_value(value).ok()
        }

        let state = self.lock();
        match section {
            Section::TeamPreferences => encode(&state.team),
            Section::AppearancePreferences => encode(&state.appearance),
            Section::ConcertPreferences => encode(&state.concerts),
            Section::CalendarPreferences => encode(&state.calendar),
            Section::Messages => encode(&state.messages),
            Section::Notes => encode(&state.notes),
            Section::DailyMotivation => encode(&MotivationEntry {
                motivation: state.motivation.daily_motivation.clone(),
                date: state.motivation.daily_motivation_date.clone(),
            }),
            Section::Password | Section::Other(_) => None,
        }
    }

    /// Push one section to the server, falling back to local storage
    async fn persist(&self, section: &Section) {
        let Some(value) = self.section_value(section) else {
            return;
        };

        match self.api.save_section(section.name(), &value).await {
            Ok(()) => tracing::debug!(section = section.name(), "Section saved"),
            Err(e) => {
                tracing::warn!(section = section.name(), error = %e, "Save failed, keeping section in local storage");
                self.store_locally(section, value);
            }
        }
    }

    fn store_locally(&self, section: &Section, value: Value) {
        let result = if *section == Section::DailyMotivation {
            let entry: MotivationEntry = serde_json::from_value(value).unwrap_or_default();
            self.local
                .set(MOTIVATION_KEY, json!(entry.motivation))
                .and_then(|_| self.local.set(MOTIVATION_DATE_KEY, json!(entry.date)))
        } else {
            self.local.set(section.name(), value)
        };
        if let Err(e) = result {
            tracing::error!(section = section.name(), error = %e, "Section lost: local storage unavailable");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teams
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns whether the team is selected afterwards
    pub async fn toggle_team(&self, key: TeamKey) -> bool {
        self.update(Section::TeamPreferences, |s| {
            let selected = s.team.selected_teams.toggle(key.clone());
            if !selected {
                s.team.favorite_teams.remove(&key);
            }
            selected
        })
        .await
    }

    /// Returns whether the team is a favourite afterwards
    pub async fn toggle_favorite(&self, key: TeamKey) -> bool {
        self.update(Section::TeamPreferences, |s| {
            let favorite = s.team.favorite_teams.toggle(key.clone());
            if favorite {
                s.team.selected_teams.insert(key);
            }
            favorite
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messages and notes
    // ─────────────────────────────────────────────────────────────────────────

    pub fn unread_messages(&self) -> usize {
        self.lock().unread_messages()
    }

    /// Returns false when no message has that id
    pub async fn mark_read(&self, id: &str) -> bool {
        if !self.read(|s| s.messages.iter().any(|m| m.id == id && !m.read)) {
            return false;
        }
        self.update(Section::Messages, |s| {
            for message in s.messages.iter_mut().filter(|m| m.id == id) {
                message.read = true;
            }
        })
        .await;
        true
    }

    pub async fn delete_message(&self, id: &str) -> bool {
        if !self.read(|s| s.messages.iter().any(|m| m.id == id)) {
            return false;
        }
        self.update(Section::Messages, |s| s.messages.retain(|m| m.id != id))
            .await;
        true
    }

    /// Returns the new note's id; blank content is ignored
    pub async fn add_note(&self, content: &str, color: NoteColor, now: DateTime<Utc>) -> Option<String> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let note = Note::new(content, color, now);
        let id = note.id.clone();
        self.update(Section::Notes, |s| s.notes.push(note)).await;
        Some(id)
    }

    pub async fn delete_note(&self, id: &str) -> bool {
        if !self.read(|s| s.notes.iter().any(|n| n.id == id)) {
            return false;
        }
        self.update(Section::Notes, |s| s.notes.retain(|n| n.id != id))
            .await;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calendar tokens
    // ─────────────────────────────────────────────────────────────────────────

    pub fn calendar(&self) -> CalendarPreferences {
        self.lock().calendar.clone()
    }

    /// Store the tokens from a successful OAuth redirect. A refresh token
    /// already on file survives when Google sends none; calendar ids are
    /// replaced only when `calendar_ids` is non-empty.
    pub async fn connect_calendar(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        calendar_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> CalendarPreferences {
        self.update(Section::CalendarPreferences, |s| {
            s.calendar.connect(access_token, refresh_token, expires_in_secs, now);
            if !calendar_ids.is_empty() {
                s.calendar.calendar_ids = calendar_ids;
            }
            s.calendar.clone()
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Daily motivation
    // ─────────────────────────────────────────────────────────────────────────

    /// Today's motivation: the stored one if it is from `today`, otherwise
    /// the day's pick, which is then persisted
    pub async fn daily_motivation(&self, today: NaiveDate) -> String {
        let date = today.format("%Y-%m-%d").to_string();
        let stored = self.read(|s| match &s.motivation {
            MotivationView {
                daily_motivation: Some(text),
                daily_motivation_date: Some(d),
            } if *d == date && !text.is_empty() => Some(text.clone()),
            _ => None,
        });
        if let Some(text) = stored {
            return text;
        }

        let text = motivation::for_day(today).to_string();
        self.update(Section::DailyMotivation, |s| {
            s.motivation = MotivationView {
                daily_motivation: Some(text.clone()),
                daily_motivation_date: Some(date),
            };
        })
        .await;
        text
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeApi;
    use super::*;

    fn doc(value: Value) -> FakeApi {
        FakeApi {
            document: Mutex::new(Ok(value)),
            ..FakeApi::default()
        }
    }

    #[tokio::test]
    async fn test_load_uses_unredacted_calendar_section() {
        let api = Arc::new(doc(json!({
            "teamPreferences": {"selectedTeams": ["25-baseball-mlb"], "favoriteTeams": []},
            "calendarPreferences": {"calendarIds": ["primary"], "accessToken": "at-1", "tokenExpiry": 5},
        })));
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;

        let calendar = session.calendar();
        assert_eq!(calendar.access_token.as_deref(), Some("at-1"));
        assert_eq!(api.calls()[..2], ["preferences", "section:calendarPreferences"]);
        assert_eq!(session.snapshot().team.selected_teams.len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_team_ids_are_cleared_and_saved() {
        let api = Arc::new(doc(json!({
            "teamPreferences": {"selectedTeams": ["25", "26-baseball-mlb"], "favoriteTeams": ["25"]},
        })));
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;

        let team = session.snapshot().team;
        assert!(team.selected_teams.is_empty());
        assert!(team.favorite_teams.is_empty());
        let saves = api.saves();
        assert_eq!(saves[0].0, "teamPreferences");
        assert_eq!(saves[0].1, json!({"selectedTeams": [], "favoriteTeams": []}));
    }

    #[tokio::test]
    async fn test_unreachable_server_falls_back_to_local() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Err((503, "down"))),
            fail_saves: true,
            ..FakeApi::default()
        });
        let local = Arc::new(LocalStore::memory());
        local
            .set("notes", json!([{"id": "1", "content": "milk", "created_at": "2026-10-01T00:00:00Z"}]))
            .unwrap();

        let session = Session::load(api, local).await;
        assert_eq!(session.snapshot().notes[0].content, "milk");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_and_local_copy() {
        let api = Arc::new(FakeApi {
            fail_saves: true,
            ..FakeApi::default()
        });
        let local = Arc::new(LocalStore::memory());
        let session = Session::load(api, Arc::clone(&local)).await;

        let id = session
            .add_note("Call the plumber", NoteColor::Blue, Utc::now())
            .await
            .unwrap();
        assert_eq!(session.snapshot().notes[0].id, id);
        let stored = local.get("notes").unwrap();
        assert_eq!(stored[0]["content"], "Call the plumber");
        assert_eq!(stored[0]["color"], "blue");
    }

    #[tokio::test]
    async fn test_delete_note_persists_remaining_notes() {
        let api = Arc::new(doc(json!({
            "notes": [
                {"id": "1", "content": "milk", "created_at": "2026-10-01T00:00:00Z"},
                {"id": "2", "content": "eggs", "created_at": "2026-10-02T00:00:00Z"},
            ],
        })));
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;

        assert!(session.delete_note("1").await);
        assert!(!session.delete_note("1").await);
        let notes = session.snapshot().notes;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "eggs");

        let (section, saved) = api.saves().pop().unwrap();
        assert_eq!(section, "notes");
        assert_eq!(saved.as_array().unwrap().len(), 1);
        assert_eq!(saved[0]["id"], "2");
    }

    #[tokio::test]
    async fn test_unreadable_calendar_section_drops_masked_tokens() {
        let api = Arc::new(FakeApi {
            fail_section: true,
            ..doc(json!({
                "calendarPreferences": {
                    "calendarIds": ["primary"],
                    "accessToken": "***",
                    "refreshToken": "***",
                    "tokenExpiry": 5,
                },
            }))
        });
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;

        let calendar = session.calendar();
        assert!(calendar.access_token.is_none());
        assert!(calendar.refresh_token.is_none());
        assert!(calendar.token_expiry.is_none());
        assert_eq!(calendar.calendar_ids, ["primary"]);
    }

    #[tokio::test]
    async fn test_message_helpers() {
        let api = Arc::new(doc(json!({
            "messages": [
                {"id": "1", "name": "Sam", "message": "hi", "created_at": "x", "read": false},
                {"id": "2", "name": "Alex", "message": "yo", "created_at": "x", "read": true},
            ],
        })));
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;
        assert_eq!(session.unread_messages(), 1);

        assert!(session.mark_read("1").await);
        assert!(!session.mark_read("1").await);
        assert_eq!(session.unread_messages(), 0);

        assert!(session.delete_message("2").await);
        assert!(!session.delete_message("missing").await);
        let (section, saved) = api.saves().pop().unwrap();
        assert_eq!(section, "messages");
        assert_eq!(saved.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_team_toggles_keep_favourites_selected() {
        let api = Arc::new(doc(json!({})));
        let session = Session::load(api, Arc::new(LocalStore::memory())).await;
        let padres = TeamKey::new("25", "baseball", "mlb");
        let bolts = TeamKey::new("24", "football", "nfl");

        assert!(session.toggle_favorite(bolts.clone()).await);
        assert!(session.read(|s| s.team.selected_teams.contains(&bolts)));

        assert!(!session.toggle_team(padres.clone()).await);
        assert!(session.read(|s| !s.team.favorite_teams.contains(&padres)));
    }

    #[tokio::test]
    async fn test_motivation_reused_for_same_day() {
        let api = Arc::new(doc(json!({
            "dailyMotivation": "Stored words",
            "dailyMotivationDate": "2026-10-18",
        })));
        let session = Session::load(api.clone(), Arc::new(LocalStore::memory())).await;

        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(session.daily_motivation(today).await, "Stored words");
        assert!(api.saves().is_empty());

        let tomorrow = today.succ_opt().unwrap();
        let fresh = session.daily_motivation(tomorrow).await;
        assert_eq!(fresh, motivation::for_day(tomorrow));
        let (section, saved) = api.saves().pop().unwrap();
        assert_eq!(section, "dailyMotivation");
        assert_eq!(saved, json!({"motivation": fresh, "date": "2026-10-19"}));
    }
}
