//! Sports presentation rules: team colours, live-game detection, game and
//! record summaries built from ESPN scoreboard/schedule/team payloads.
//!
//! Pure functions only; the client core feeds them payloads it fetched
//! through the server.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{first_str, lookup};

/// Primary colour when a team has none
pub const DEFAULT_PRIMARY: &str = "#EAB308";
/// Secondary colour when a team has none
pub const DEFAULT_SECONDARY: &str = "#F97316";
/// RGB of `DEFAULT_PRIMARY`, used when a colour cannot be parsed
const DEFAULT_RGB: (u8, u8, u8) = (234, 179, 8);

// ─────────────────────────────────────────────────────────────────────────────
// Colours
// ─────────────────────────────────────────────────────────────────────────────

/// Ensure a leading `#`
pub fn normalize_hex(color: &str) -> String {
    let color = color.trim();
    if color.starts_with('#') {
        color.to_string()
    } else {
        format!("#{color}")
    }
}

/// Parse `#rrggbb` or `#rgb`
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Foreground tone that stays readable on a background colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTone {
    Dark,
    Light,
}

/// Perceived brightness above 128 (of 255) calls for dark text
pub fn text_tone(hex: &str) -> TextTone {
    let (r, g, b) = hex_to_rgb(hex).unwrap_or(DEFAULT_RGB);
    // Weighted sum, in thousandths
    let brightness = u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114;
    if brightness > 128_000 {
        TextTone::Dark
    } else {
        TextTone::Light
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPalette {
    pub primary: String,
    pub secondary: String,
    pub text: TextTone,
}

impl TeamPalette {
    pub fn new(primary: Option<&str>, secondary: Option<&str>) -> Self {
        let pick = |color: Option<&str>, fallback: &str| {
            color
                .map(str::trim)
                .filter(|c| !c.is_empty() && *c != "#")
                .map(normalize_hex)
                .unwrap_or_else(|| fallback.to_string())
        };
        let primary = pick(primary, DEFAULT_PRIMARY);
        let secondary = pick(secondary, DEFAULT_SECONDARY);
        let text = text_tone(&primary);
        Self {
            primary,
            secondary,
            text,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Game status
// ─────────────────────────────────────────────────────────────────────────────

/// Description fragments that only appear while play is under way
const LIVE_MARKERS: [&str; 7] = [
    "live",
    "in progress",
    "qtr",
    "quarter",
    "inning",
    "period",
    "halftime",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Scheduled,
    Live,
    Final,
    Postponed,
}

/// Classify an ESPN `status` object plus the competitors' scores
pub fn classify_status(status: &Value, competitors: &[Value]) -> GameState {
    let name = first_str(status, &["type.name"]).unwrap_or_default();
    let state = first_str(status, &["type.state"]).unwrap_or_default();
    let description = first_str(
        status,
        &["type.description", "type.detail", "type.shortDetail"],
    )
    .unwrap_or_default()
    .to_lowercase();
    let completed = lookup(status, "type.completed")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let is_final = name == "STATUS_FINAL" || completed || state == "post" || description.contains("final");
    let is_postponed = name == "STATUS_POSTPONED" || description.contains("postponed");
    let is_scheduled = name == "STATUS_SCHEDULED" || state == "pre" || description.contains("scheduled");

    if name == "STATUS_IN_PROGRESS" || state == "in" {
        return GameState::Live;
    }
    if is_final {
        return GameState::Final;
    }
    if is_postponed {
        return GameState::Postponed;
    }

    let mentions_end = description
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "end");
    if LIVE_MARKERS.iter().any(|m| description.contains(m)) || mentions_end {
        return GameState::Live;
    }

    if !is_scheduled && competitors.iter().any(|c| parse_score(c).unwrap_or(0) > 0) {
        return GameState::Live;
    }

    GameState::Scheduled
}

/// ESPN sends scores as strings, numbers, or `{value, displayValue}`
pub fn parse_score(competitor: &Value) -> Option<u32> {
    let score = competitor.get("score")?;
    match score {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64().map(|f| f as u32),
        Value::Object(_) => score
            .get("value")
            .and_then(Value::as_f64)
            .map(|f| f as u32)
            .or_else(|| first_str(score, &["displayValue"])?.parse().ok()),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Game summaries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub team_id: String,
    pub name: String,
    pub abbreviation: Option<String>,
    pub logo: Option<String>,
    pub home: bool,
    /// Only populated while the game is live
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: String,
    pub name: String,
    pub date: String,
    pub state: GameState,
    pub detail: String,
    pub competitors: Vec<Competitor>,
    pub venue: Option<String>,
    pub broadcast: Option<String>,
}

impl GameSummary {
    pub fn is_live(&self) -> bool {
        self.state == GameState::Live
    }

    /// Build from an ESPN scoreboard or schedule event
    pub fn from_event(event: &Value) -> Option<Self> {
        let competition = lookup(event, "competitions.0")?;
        let raw_competitors: Vec<Value> = competition
            .get("competitors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let status = event
            .get("status")
            .or_else(|| competition.get("status"))
            .cloned()
            .unwrap_or(Value::Null);
        let state = classify_status(&status, &raw_competitors);
        let live = state == GameState::Live;

        let competitors = raw_competitors
            .iter()
            .map(|c| Competitor {
                team_id: first_str(c, &["team.id", "id"]).unwrap_or_default(),
                name: first_str(c, &["team.displayName", "team.name"]).unwrap_or_default(),
                abbreviation: first_str(c, &["team.abbreviation"]),
                logo: first_str(c, &["team.logo", "team.logos.0.href"]),
                home: c.get("homeAway").and_then(Value::as_str) == Some("home"),
                score: if live { parse_score(c) } else { None },
            })
            .collect();

        Some(Self {
            id: first_str(event, &["id"]).unwrap_or_default(),
            name: first_str(event, &["shortName", "name"]).unwrap_or_default(),
            date: first_str(event, &["date"]).unwrap_or_default(),
            state,
            detail: first_str(&status, &["type.shortDetail", "type.detail", "type.description"])
                .unwrap_or_default(),
            competitors,
            venue: first_str(competition, &["venue.fullName"]),
            broadcast: first_str(competition, &["broadcasts.0.names.0"]),
        })
    }
}

fn involves_team(event: &Value, team_id: &str) -> bool {
    lookup(event, "competitions.0.competitors")
        .and_then(Value::as_array)
        .map(|cs| {
            cs.iter()
                .any(|c| first_str(c, &["team.id", "id"]).as_deref() == Some(team_id))
        })
        .unwrap_or(false)
}

/// Today's game for `team_id` from a scoreboard payload
pub fn game_from_scoreboard(scoreboard: &Value, team_id: &str) -> Option<GameSummary> {
    scoreboard
        .get("events")?
        .as_array()?
        .iter()
        .find(|e| involves_team(e, team_id))
        .and_then(GameSummary::from_event)
}

/// Earliest not-yet-finished game on or after `now` from a schedule payload
pub fn next_game_from_schedule(schedule: &Value, now: DateTime<Utc>) -> Option<GameSummary> {
    schedule
        .get("events")?
        .as_array()?
        .iter()
        .filter_map(GameSummary::from_event)
        .filter(|g| g.state != GameState::Final)
        .filter_map(|g| {
            let at = parse_espn_date(&g.date)?;
            (at >= now || g.is_live()).then_some((at, g))
        })
        .min_by_key(|(at, _)| *at)
        .map(|(_, g)| g)
}

/// ESPN dates come as `2026-04-01T02:10Z` (no seconds) or full RFC 3339
pub fn parse_espn_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(date) {
        return Some(at.with_timezone(&Utc));
    }
    let bare = date.strip_suffix('Z')?;
    NaiveDateTime::parse_from_str(bare, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|at| at.and_utc())
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub summary: Option<String>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
    pub ties: Option<u32>,
}

/// Overall record from an ESPN team object
pub fn record_from_team(team: &Value) -> Option<TeamRecord> {
    let item = lookup(team, "record.items.0")?;
    let stat = |name: &str| {
        item.get("stats")?
            .as_array()?
            .iter()
            .find(|s| s.get("name").and_then(Value::as_str) == Some(name))?
            .get("value")?
            .as_f64()
            .map(|v| v as u32)
    };
    Some(TeamRecord {
        summary: first_str(item, &["summary"]),
        wins: stat("wins"),
        losses: stat("losses"),
        ties: stat("ties"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_palette_normalizes_and_defaults() {
        let palette = TeamPalette::new(Some("EAB308"), None);
        assert_eq!(palette.primary, "#EAB308");
        assert_eq!(palette.secondary, DEFAULT_SECONDARY);
        assert_eq!(palette.text, TextTone::Dark);

        let empty = TeamPalette::new(Some(""), Some("  "));
        assert_eq!(empty.primary, DEFAULT_PRIMARY);
        assert_eq!(empty.secondary, DEFAULT_SECONDARY);

        let navy = TeamPalette::new(Some("#002D62"), Some("#FFC425"));
        assert_eq!(navy.text, TextTone::Light);
        assert_eq!(navy.secondary, "#FFC425");
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(hex_to_rgb("#fff"), Some((255, 255, 255)));
        assert_eq!(hex_to_rgb("000000"), Some((0, 0, 0)));
        assert_eq!(hex_to_rgb("#12345"), None);
        assert_eq!(hex_to_rgb("#zzzzzz"), None);
        // Unparseable colours are judged as the default yellow
        assert_eq!(text_tone("not-a-color"), TextTone::Dark);
    }

    #[test]
    fn test_text_tone_threshold_is_exact() {
        // 128.564, just over the line
        assert_eq!(text_tone("#02DA00"), TextTone::Dark);
        // Exactly 128 is not bright enough
        assert_eq!(text_tone("#808080"), TextTone::Light);
        assert_eq!(text_tone("#818181"), TextTone::Dark);
    }

    fn status(name: &str, state: &str, description: &str) -> Value {
        json!({"type": {"name": name, "state": state, "description": description}})
    }

    #[test]
    fn test_live_detection_rules() {
        let zero = [json!({"score": "0"}), json!({"score": "0"})];
        let scored = [json!({"score": "3"}), json!({"score": "1"})];

        assert_eq!(classify_status(&status("STATUS_IN_PROGRESS", "", ""), &zero), GameState::Live);
        assert_eq!(classify_status(&status("", "in", ""), &zero), GameState::Live);
        assert_eq!(classify_status(&status("X", "", "Top 5th Inning"), &zero), GameState::Live);
        assert_eq!(classify_status(&status("X", "", "Halftime"), &zero), GameState::Live);
        assert_eq!(classify_status(&status("X", "", "End of 3rd"), &zero), GameState::Live);
        assert_eq!(classify_status(&status("X", "", "Weekend special"), &zero), GameState::Scheduled);
        assert_eq!(classify_status(&status("X", "", ""), &scored), GameState::Live);

        assert_eq!(classify_status(&status("STATUS_FINAL", "post", "Final"), &scored), GameState::Final);
        assert_eq!(classify_status(&status("X", "", "Final/10 innings"), &scored), GameState::Final);
        assert_eq!(classify_status(&status("STATUS_SCHEDULED", "pre", "Scheduled"), &scored), GameState::Scheduled);
        assert_eq!(classify_status(&status("STATUS_POSTPONED", "", "Postponed"), &scored), GameState::Postponed);
    }

    fn event(state: &str, home_score: &str) -> Value {
        json!({
            "id": "401",
            "name": "Dodgers at Padres",
            "shortName": "LAD @ SD",
            "date": "2026-04-01T02:10Z",
            "status": {"type": {"name": "", "state": state, "shortDetail": "Bot 7th"}},
            "competitions": [{
                "venue": {"fullName": "Petco Park"},
                "competitors": [
                    {"homeAway": "home", "score": home_score, "team": {"id": "25", "displayName": "San Diego Padres"}},
                    {"homeAway": "away", "score": {"value": 2.0}, "team": {"id": "19", "displayName": "Los Angeles Dodgers"}}
                ]
            }]
        })
    }

    #[test]
    fn test_scores_only_surface_when_live() {
        let live = GameSummary::from_event(&event("in", "4")).unwrap();
        assert!(live.is_live());
        assert_eq!(live.competitors[0].score, Some(4));
        assert_eq!(live.competitors[1].score, Some(2));
        assert_eq!(live.venue.as_deref(), Some("Petco Park"));

        let upcoming = GameSummary::from_event(&event("pre", "0")).unwrap();
        assert_eq!(upcoming.state, GameState::Scheduled);
        assert!(upcoming.competitors.iter().all(|c| c.score.is_none()));
    }

    #[test]
    fn test_scoreboard_lookup_by_team() {
        let board = json!({"events": [event("in", "1")]});
        assert!(game_from_scoreboard(&board, "25").is_some());
        assert!(game_from_scoreboard(&board, "99").is_none());
    }

    #[test]
    fn test_next_game_skips_past_and_final() {
        let now = Utc::now();
        let mut past = event("pre", "0");
        past["date"] = json!("2000-01-01T00:00Z");
        let mut later = event("pre", "0");
        later["id"] = json!("later");
        later["date"] = json!((now + chrono::Duration::days(3)).to_rfc3339());
        let mut sooner = event("pre", "0");
        sooner["id"] = json!("sooner");
        sooner["date"] = json!((now + chrono::Duration::days(1)).to_rfc3339());

        let schedule = json!({"events": [past, later, sooner]});
        assert_eq!(next_game_from_schedule(&schedule, now).unwrap().id, "sooner");
    }

    #[test]
    fn test_espn_short_dates_parse() {
        assert!(parse_espn_date("2026-04-01T02:10Z").is_some());
        assert!(parse_espn_date("2026-04-01T02:10:00Z").is_some());
        assert!(parse_espn_date("soon").is_none());
    }

    #[test]
    fn test_record_extraction() {
        let team = json!({"record": {"items": [{
            "summary": "90-72",
            "stats": [{"name": "wins", "value": 90.0}, {"name": "losses", "value": 72.0}]
        }]}});
        let record = record_from_team(&team).unwrap();
        assert_eq!(record.summary.as_deref(), Some("90-72"));
        assert_eq!(record.wins, Some(90));
        assert_eq!(record.ties, None);
        assert!(record_from_team(&json!({})).is_none());
    }
}
