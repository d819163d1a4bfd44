//! Section names and their storage mapping
//!
//! A section name arrives as a string on the wire. Known names map to a fixed
//! storage key (file tier) and column (database tier); anything else is kept
//! verbatim under `Other` and lands in the database tier's `extra` column.

use serde_json::Value;

use super::document::{
    AppearancePreferences, CalendarPreferences, ConcertPreferences, Message, Note,
    TeamPreferences,
};
use super::StoreError;

/// Storage key of the combined motivation object
pub const MOTIVATION_DATA_KEY: &str = "dailyMotivationData";
/// Storage key of the motivation date
pub const MOTIVATION_DATE_KEY: &str = "dailyMotivationDate";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Section {
    Password,
    TeamPreferences,
    AppearancePreferences,
    ConcertPreferences,
    CalendarPreferences,
    Messages,
    Notes,
    /// Virtual: backed by three storage keys
    DailyMotivation,
    Other(String),
}

impl Section {
    pub fn parse(name: &str) -> Self {
        match name {
            "password" => Self::Password,
            "teamPreferences" => Self::TeamPreferences,
            "appearancePreferences" => Self::AppearancePreferences,
            "concertPreferences" => Self::ConcertPreferences,
            "calendarPreferences" => Self::CalendarPreferences,
            "messages" => Self::Messages,
            "notes" => Self::Notes,
            "dailyMotivation" => Self::DailyMotivation,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name, also the storage key in the file tier
    pub fn name(&self) -> &str {
        match self {
            Self::Password => "password",
            Self::TeamPreferences => "teamPreferences",
            Self::AppearancePreferences => "appearancePreferences",
            Self::ConcertPreferences => "concertPreferences",
            Self::CalendarPreferences => "calendarPreferences",
            Self::Messages => "messages",
            Self::Notes => "notes",
            Self::DailyMotivation => "dailyMotivation",
            Self::Other(name) => name,
        }
    }

    /// Validate a whole-section value and return its canonical JSON form.
    ///
    /// Typed sections round-trip through their struct, which collapses
    /// duplicate team keys and fills missing fields. Unknown sections are
    /// stored as given.
    pub fn normalize(&self, value: Value) -> Result<Value, StoreError> {
        let invalid = |e: serde_json::Error| StoreError::InvalidSection {
            section: self.name().to_string(),
            reason: e.to_string(),
        };

        match self {
            Self::Password => match value {
                Value::String(_) => Ok(value),
                _ => Err(StoreError::InvalidSection {
                    section: self.name().to_string(),
                    reason: "password must be a string".to_string(),
                }),
            },
            Self::TeamPreferences => {
                roundtrip::<TeamPreferences>(value).map_err(invalid)
            }
            Self::AppearancePreferences => {
                roundtrip::<AppearancePreferences>(value).map_err(invalid)
            }
            Self::ConcertPreferences => {
                roundtrip::<ConcertPreferences>(value).map_err(invalid)
            }
            Self::CalendarPreferences => {
                roundtrip::<CalendarPreferences>(value).map_err(invalid)
            }
            Self::Messages => roundtrip::<Vec<Message>>(value).map_err(invalid),
            Self::Notes => roundtrip::<Vec<Note>>(value).map_err(invalid),
            Self::DailyMotivation | Self::Other(_) => Ok(value),
        }
    }
}

fn roundtrip<T>(value: Value) -> Result<Value, serde_json::Error>
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let typed: T = serde_json::from_value(value)?;
    serde_json::to_value(typed)
}

/// Database column for a storage key, `None` for keys kept in `extra`
pub fn column_for_key(key: &str) -> Option<&'static str> {
    match key {
        "password" => Some("password"),
        "teamPreferences" => Some("team_preferences"),
        "appearancePreferences" => Some("appearance_preferences"),
        "concertPreferences" => Some("concert_preferences"),
        "calendarPreferences" => Some("calendar_preferences"),
        "messages" => Some("messages"),
        "notes" => Some("notes"),
        "dailyMotivation" => Some("daily_motivation"),
        MOTIVATION_DATE_KEY => Some("daily_motivation_date"),
        MOTIVATION_DATA_KEY => Some("daily_motivation_data"),
        _ => None,
    }
}

/// Every `(storage key, column)` pair in document order
pub const COLUMNS: [(&str, &str); 10] = [
    ("password", "password"),
    ("teamPreferences", "team_preferences"),
    ("appearancePreferences", "appearance_preferences"),
    ("concertPreferences", "concert_preferences"),
    ("calendarPreferences", "calendar_preferences"),
    ("messages", "messages"),
    ("notes", "notes"),
    ("dailyMotivation", "daily_motivation"),
    (MOTIVATION_DATE_KEY, "daily_motivation_date"),
    (MOTIVATION_DATA_KEY, "daily_motivation_data"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_and_unknown_names() {
        assert_eq!(Section::parse("notes"), Section::Notes);
        assert_eq!(Section::parse("dailyMotivation"), Section::DailyMotivation);
        let other = Section::parse("weatherPreferences");
        assert_eq!(other, Section::Other("weatherPreferences".to_string()));
        assert_eq!(other.name(), "weatherPreferences");
    }

    #[test]
    fn test_every_known_key_has_a_column() {
        for (key, column) in COLUMNS {
            assert_eq!(column_for_key(key), Some(column));
        }
        assert_eq!(column_for_key("weatherPreferences"), None);
    }

    #[test]
    fn test_normalize_dedupes_team_keys() {
        let value = Section::TeamPreferences
            .normalize(json!({
                "selectedTeams": ["1-baseball-mlb", "1-baseball-mlb"],
                "favoriteTeams": []
            }))
            .unwrap();
        assert_eq!(value["selectedTeams"], json!(["1-baseball-mlb"]));
    }

    #[test]
    fn test_normalize_rejects_wrong_shapes() {
        assert!(Section::Messages.normalize(json!({"not": "a list"})).is_err());
        assert!(Section::Password.normalize(json!(42)).is_err());
        assert!(matches!(
            Section::Notes.normalize(json!("x")),
            Err(StoreError::InvalidSection { .. })
        ));
    }

    #[test]
    fn test_unknown_sections_pass_through() {
        let value = json!({"anything": [1, 2, 3]});
        assert_eq!(
            Section::parse("custom").normalize(value.clone()).unwrap(),
            value
        );
    }
}
