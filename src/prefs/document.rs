//! Typed preference sections
//!
//! The store persists sections as JSON, but everything that reads or mutates
//! them goes through these types so the invariants hold in one place:
//!
//! - team selections are ordered sets of composite `TeamKey`s
//! - widget orders are permutations of a closed widget enum
//! - calendar tokens carry their own expiry arithmetic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Team every fresh document starts with (San Diego Padres)
pub const DEFAULT_TEAM: &str = "25-baseball-mlb";

/// Lifetime assumed for a refreshed Google access token
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

// ─────────────────────────────────────────────────────────────────────────────
// Teams
// ─────────────────────────────────────────────────────────────────────────────

/// Composite team identifier: `{externalId}-{sport}-{league}`
///
/// The league segment may itself contain dashes (`college-football`), so
/// parsing splits on the first two separators only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamKey(String);

impl TeamKey {
    pub fn new(id: &str, sport: &str, league: &str) -> Self {
        Self(format!("{id}-{sport}-{league}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare ids from before sport/league were part of the key
    pub fn is_legacy(&self) -> bool {
        !self.0.contains('-')
    }

    /// `(id, sport, league)` when the key is well formed
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        let mut it = self.0.splitn(3, '-');
        let id = it.next().filter(|s| !s.is_empty())?;
        let sport = it.next().filter(|s| !s.is_empty())?;
        let league = it.next().filter(|s| !s.is_empty())?;
        Some((id, sport, league))
    }
}

impl From<&str> for TeamKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TeamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Insertion-ordered set of team keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TeamKey>", into = "Vec<TeamKey>")]
pub struct TeamSet(Vec<TeamKey>);

impl From<Vec<TeamKey>> for TeamSet {
    fn from(keys: Vec<TeamKey>) -> Self {
        let mut set = Self::default();
        for key in keys {
            set.insert(key);
        }
        set
    }
}

impl From<TeamSet> for Vec<TeamKey> {
    fn from(set: TeamSet) -> Self {
        set.0
    }
}

impl TeamSet {
    /// Returns false when the key was already present
    pub fn insert(&mut self, key: TeamKey) -> bool {
        if self.0.contains(&key) {
            return false;
        }
        self.0.push(key);
        true
    }

    pub fn remove(&mut self, key: &TeamKey) -> bool {
        let before = self.0.len();
        self.0.retain(|k| k != key);
        self.0.len() != before
    }

    /// Add when absent, remove when present. Returns membership afterwards.
    pub fn toggle(&mut self, key: TeamKey) -> bool {
        if self.remove(&key) {
            false
        } else {
            self.0.push(key);
            true
        }
    }

    pub fn contains(&self, key: &TeamKey) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// `teamPreferences` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamPreferences {
    pub selected_teams: TeamSet,
    pub favorite_teams: TeamSet,
}

impl Default for TeamPreferences {
    fn default() -> Self {
        let default = TeamSet::from(vec![TeamKey::from(DEFAULT_TEAM)]);
        Self {
            selected_teams: default.clone(),
            favorite_teams: default,
        }
    }
}

impl TeamPreferences {
    /// Clear both lists if any selection predates composite keys.
    ///
    /// Returns true when the section changed and should be persisted.
    pub fn reshape_legacy(&mut self) -> bool {
        if !self.selected_teams.iter().any(TeamKey::is_legacy) {
            return false;
        }
        self.selected_teams.clear();
        self.favorite_teams.clear();
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Appearance
// ─────────────────────────────────────────────────────────────────────────────

/// Dashboard widget identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetId {
    Weather,
    Sports,
    Concerts,
    Motivation,
    Calendar,
    Notes,
}

impl WidgetId {
    /// Canonical order of the main column
    pub const MAIN: [WidgetId; 4] = [
        WidgetId::Weather,
        WidgetId::Sports,
        WidgetId::Concerts,
        WidgetId::Motivation,
    ];

    /// Canonical order of the left panel
    pub const LEFT: [WidgetId; 2] = [WidgetId::Calendar, WidgetId::Notes];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Sports => "sports",
            Self::Concerts => "concerts",
            Self::Motivation => "motivation",
            Self::Calendar => "calendar",
            Self::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weather" => Some(Self::Weather),
            "sports" => Some(Self::Sports),
            "concerts" => Some(Self::Concerts),
            "motivation" => Some(Self::Motivation),
            "calendar" => Some(Self::Calendar),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

/// Reduce a stored order to a permutation of `canonical`.
///
/// Unknown ids, ids from the other panel and duplicates are dropped; canonical
/// ids that are missing are appended in canonical order.
pub fn normalize_order(raw: &[String], canonical: &[WidgetId]) -> Vec<WidgetId> {
    let mut order: Vec<WidgetId> = Vec::with_capacity(canonical.len());
    for id in raw.iter().filter_map(|s| WidgetId::parse(s)) {
        if canonical.contains(&id) && !order.contains(&id) {
            order.push(id);
        }
    }
    for id in canonical {
        if !order.contains(id) {
            order.push(*id);
        }
    }
    order
}

fn yes() -> bool {
    true
}

fn default_dashboard_name() -> String {
    "Dad Dashboard".to_string()
}

fn default_widget_order() -> Vec<String> {
    WidgetId::MAIN.iter().map(|w| w.as_str().to_string()).collect()
}

fn default_left_panel_order() -> Vec<String> {
    WidgetId::LEFT.iter().map(|w| w.as_str().to_string()).collect()
}

/// `appearancePreferences` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearancePreferences {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "yes")]
    pub show_weather: bool,
    #[serde(default = "yes")]
    pub show_sports: bool,
    #[serde(default = "yes")]
    pub show_notes: bool,
    #[serde(default = "yes")]
    pub show_motivation: bool,
    #[serde(default = "yes")]
    pub show_concerts: bool,
    #[serde(default = "yes")]
    pub show_calendar: bool,
    #[serde(default = "default_dashboard_name")]
    pub dashboard_name: String,
    #[serde(default = "default_widget_order")]
    pub widget_order: Vec<String>,
    #[serde(default = "default_left_panel_order")]
    pub left_panel_order: Vec<String>,
    /// Settings written by newer clients
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppearancePreferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            show_weather: true,
            show_sports: true,
            show_notes: true,
            show_motivation: true,
            show_concerts: true,
            show_calendar: true,
            dashboard_name: default_dashboard_name(),
            widget_order: default_widget_order(),
            left_panel_order: default_left_panel_order(),
            extra: Map::new(),
        }
    }
}

impl AppearancePreferences {
    pub fn main_order(&self) -> Vec<WidgetId> {
        normalize_order(&self.widget_order, &WidgetId::MAIN)
    }

    pub fn left_order(&self) -> Vec<WidgetId> {
        normalize_order(&self.left_panel_order, &WidgetId::LEFT)
    }

    /// Rewrite both stored orders into canonical permutations.
    ///
    /// Returns true when anything changed.
    pub fn normalize(&mut self) -> bool {
        let main: Vec<String> = self
            .main_order()
            .into_iter()
            .map(|w| w.as_str().to_string())
            .collect();
        let left: Vec<String> = self
            .left_order()
            .into_iter()
            .map(|w| w.as_str().to_string())
            .collect();
        let changed = main != self.widget_order || left != self.left_panel_order;
        self.widget_order = main;
        self.left_panel_order = left;
        changed
    }

    pub fn is_visible(&self, widget: WidgetId) -> bool {
        match widget {
            WidgetId::Weather => self.show_weather,
            WidgetId::Sports => self.show_sports,
            WidgetId::Concerts => self.show_concerts,
            WidgetId::Motivation => self.show_motivation,
            WidgetId::Calendar => self.show_calendar,
            WidgetId::Notes => self.show_notes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concerts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcertLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// `concertPreferences` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcertPreferences {
    pub favorite_artists: Vec<String>,
    pub favorite_genres: Vec<String>,
    pub location: ConcertLocation,
}

// ─────────────────────────────────────────────────────────────────────────────
// Calendar
// ─────────────────────────────────────────────────────────────────────────────

/// `calendarPreferences` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarPreferences {
    #[serde(default)]
    pub calendar_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<i64>,
}

impl CalendarPreferences {
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }

    /// True once `now` reaches the recorded expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.access_token.as_ref(), self.token_expiry) {
            (Some(_), Some(expiry)) => now.timestamp_millis() >= expiry,
            _ => false,
        }
    }

    /// Store a freshly issued access token. The refresh token is retained.
    pub fn apply_refresh(&mut self, access_token: String, now: DateTime<Utc>) {
        self.access_token = Some(access_token);
        self.token_expiry = Some(now.timestamp_millis() + ACCESS_TOKEN_LIFETIME_SECS * 1000);
    }

    /// Store tokens delivered by the OAuth callback
    pub fn connect(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) {
        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.token_expiry = Some(now.timestamp_millis() + expires_in_secs * 1000);
    }

    /// Drop every token field; calendar ids survive
    pub fn disconnect(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.token_expiry = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages and notes
// ─────────────────────────────────────────────────────────────────────────────

/// A message left through the send-message page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub name: String,
    pub message: String,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(name: &str, message: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: now.timestamp_millis().to_string(),
            name: name.trim().to_string(),
            message: message.trim().to_string(),
            created_at: now.to_rfc3339(),
            read: false,
            extra: Map::new(),
        }
    }
}

/// Sticky-note colours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub color: NoteColor,
    pub created_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    pub fn new(content: &str, color: NoteColor, now: DateTime<Utc>) -> Self {
        Self {
            id: now.timestamp_millis().to_string(),
            content: content.to_string(),
            color,
            created_at: now.to_rfc3339(),
            extra: Map::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Daily motivation
// ─────────────────────────────────────────────────────────────────────────────

/// Write shape of the virtual `dailyMotivation` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotivationEntry {
    pub motivation: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
}

/// Read shape of the virtual `dailyMotivation` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotivationView {
    pub daily_motivation: Option<String>,
    pub daily_motivation_date: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Whole document
// ─────────────────────────────────────────────────────────────────────────────

/// The single-tenant preference document with every section present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDocument {
    pub password: String,
    pub team_preferences: TeamPreferences,
    pub appearance_preferences: AppearancePreferences,
    pub concert_preferences: ConcertPreferences,
    pub calendar_preferences: CalendarPreferences,
    pub messages: Vec<Message>,
    pub notes: Vec<Note>,
    pub daily_motivation: Option<String>,
    pub daily_motivation_date: Option<String>,
    pub daily_motivation_data: Option<Value>,
}

impl PreferenceDocument {
    pub fn defaults(password: &str) -> Self {
        Self {
            password: password.to_string(),
            team_preferences: TeamPreferences::default(),
            appearance_preferences: AppearancePreferences::default(),
            concert_preferences: ConcertPreferences::default(),
            calendar_preferences: CalendarPreferences::default(),
            messages: Vec::new(),
            notes: Vec::new(),
            daily_motivation: None,
            daily_motivation_date: None,
            daily_motivation_data: None,
        }
    }

    /// Defaults as the raw JSON object the backends persist
    pub fn default_map(password: &str) -> Map<String, Value> {
        match serde_json::to_value(Self::defaults(password)) {
            Ok(Value::Object(map)) => map,
            // Every field above serializes to plain JSON
            _ => Map::new(),
        }
    }
}
