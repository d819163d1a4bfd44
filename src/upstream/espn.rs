//! ESPN site API: teams, team detail with schedule, scoreboard

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sports::normalize_hex;
use super::{fetch_json, first_str, lookup, UpstreamError};

/// Professional or college league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeagueKind {
    Pro,
    College,
}

/// A league the all-teams listing covers
#[derive(Debug, Clone, Copy)]
pub struct LeagueSpec {
    pub sport: &'static str,
    pub league: &'static str,
    pub name: &'static str,
    pub kind: LeagueKind,
}

pub const LEAGUES: [LeagueSpec; 6] = [
    LeagueSpec { sport: "baseball", league: "mlb", name: "MLB", kind: LeagueKind::Pro },
    LeagueSpec { sport: "football", league: "nfl", name: "NFL", kind: LeagueKind::Pro },
    LeagueSpec { sport: "basketball", league: "nba", name: "NBA", kind: LeagueKind::Pro },
    LeagueSpec { sport: "hockey", league: "nhl", name: "NHL", kind: LeagueKind::Pro },
    LeagueSpec { sport: "football", league: "college-football", name: "NCAA Football", kind: LeagueKind::College },
    LeagueSpec { sport: "basketball", league: "mens-college-basketball", name: "NCAA Basketball", kind: LeagueKind::College },
];

// ─────────────────────────────────────────────────────────────────────────────
// DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub alternate_color: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<LeagueKind>,
}

impl Team {
    /// Build from an ESPN `team` object; `None` when it has no id
    pub fn from_espn(team: &Value) -> Option<Self> {
        let id = match team.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        Some(Self {
            id,
            name: first_str(team, &["displayName", "name"]).unwrap_or_default(),
            abbreviation: first_str(team, &["abbreviation"]),
            location: first_str(team, &["location"]),
            logo: first_str(team, &["logo", "logos.0.href"]),
            color: first_str(team, &["color"]).map(|c| normalize_hex(&c)),
            alternate_color: first_str(team, &["alternateColor"]).map(|c| normalize_hex(&c)),
            slug: first_str(team, &["slug"]),
            ..Self::default()
        })
    }

    fn tagged(mut self, spec: &LeagueSpec) -> Self {
        self.sport = Some(spec.sport.to_string());
        self.league = Some(spec.league.to_string());
        self.league_name = Some(spec.name.to_string());
        self.kind = Some(spec.kind);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsResponse {
    pub teams: Vec<Team>,
    pub sport: String,
    pub league: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTeams {
    pub teams: Vec<Team>,
    pub teams_by_city: BTreeMap<String, Vec<Team>>,
    pub total: usize,
}

impl AllTeams {
    pub fn from_teams(teams: Vec<Team>) -> Self {
        let mut teams_by_city: BTreeMap<String, Vec<Team>> = BTreeMap::new();
        for team in &teams {
            let city = team
                .location
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            teams_by_city.entry(city).or_default().push(team.clone());
        }
        Self {
            total: teams.len(),
            teams,
            teams_by_city,
        }
    }
}

/// Team detail plus the coming week's schedule (null when unavailable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub team: Value,
    pub schedule: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct EspnClient {
    http: reqwest::Client,
    base_url: String,
}

/// Path segments go straight into URLs; keep them to ESPN's slug alphabet
pub fn validate_segment(name: &str, value: &str) -> Result<(), UpstreamError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(UpstreamError::InvalidInput(format!("invalid {name}")))
    }
}

impl EspnClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub(crate) fn url(&self, sport: &str, league: &str, tail: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            sport,
            league,
            tail
        )
    }

    pub(crate) async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        tracing::debug!(url, "ESPN request");
        fetch_json(self.http.get(url).query(query)).await
    }

    /// Teams of one league
    pub async fn teams(&self, sport: &str, league: &str) -> Result<Vec<Team>, UpstreamError> {
        validate_segment("sport", sport)?;
        validate_segment("league", league)?;

        let data = self.get(&self.url(sport, league, "teams"), &[]).await?;
        let teams = lookup(&data, "sports.0.leagues.0.teams")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| Team::from_espn(entry.get("team").unwrap_or(entry)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(teams)
    }

    /// Teams across every supported league; failed leagues are skipped
    pub async fn all_teams(&self) -> AllTeams {
        let fetches = LEAGUES.iter().map(|spec| async move {
            match self.teams(spec.sport, spec.league).await {
                Ok(teams) => teams.into_iter().map(|t| t.tagged(spec)).collect(),
                Err(e) => {
                    tracing::warn!(league = spec.league, error = %e, "Skipping league in all-teams listing");
                    Vec::new()
                }
            }
        });

        let teams: Vec<Team> = join_all(fetches).await.into_iter().flatten().collect();
        AllTeams::from_teams(teams)
    }

    /// Raw ESPN team object
    pub async fn team(&self, sport: &str, league: &str, team_id: &str) -> Result<Value, UpstreamError> {
        validate_segment("sport", sport)?;
        validate_segment("league", league)?;
        validate_segment("teamId", team_id)?;

        let data = self
            .get(&self.url(sport, league, &format!("teams/{team_id}")), &[])
            .await?;
        data.get("team")
            .cloned()
            .ok_or_else(|| UpstreamError::Decode("response has no team".to_string()))
    }

    /// Team detail plus a 7-day schedule starting `today`
    pub async fn team_info(
        &self,
        sport: &str,
        league: &str,
        team_id: &str,
        today: NaiveDate,
    ) -> Result<TeamInfo, UpstreamError> {
        let team = self.team(sport, league, team_id).await?;

        let range = schedule_range(today);
        let schedule = match self
            .get(
                &self.url(sport, league, &format!("teams/{team_id}/schedule")),
                &[("dates", range)],
            )
            .await
        {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                tracing::debug!(team_id, error = %e, "Schedule unavailable");
                None
            }
        };

        Ok(TeamInfo { team, schedule })
    }

    /// Scoreboard payload passed through unchanged
    pub async fn scoreboard(
        &self,
        sport: &str,
        league: &str,
        dates: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        validate_segment("sport", sport)?;
        validate_segment("league", league)?;

        let mut query = Vec::new();
        if let Some(dates) = dates.filter(|d| !d.is_empty()) {
            query.push(("dates", dates.to_string()));
        }
        self.get(&self.url(sport, league, "scoreboard"), &query).await
    }
}

/// `YYYYMMDD-YYYYMMDD` covering today through a week out
pub fn schedule_range(today: NaiveDate) -> String {
    let end = today + Duration::days(7);
    format!("{}-{}", today.format("%Y%m%d"), end.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::test_support::serve;
    use axum::extract::Path;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    fn teams_payload(league: &str) -> Value {
        json!({"sports": [{"leagues": [{"teams": [
            {"team": {"id": "25", "displayName": "San Diego Padres", "abbreviation": "SD",
                      "location": "San Diego", "color": "2f241d", "alternateColor": "ffc425",
                      "logos": [{"href": format!("https://a.espncdn.com/{league}.png")}]}},
            {"team": {"id": 3, "name": "Athletics", "location": null}}
        ]}]}]})
    }

    #[test]
    fn test_team_from_espn_fields() {
        let team = Team::from_espn(&teams_payload("mlb")["sports"][0]["leagues"][0]["teams"][0]["team"]).unwrap();
        assert_eq!(team.id, "25");
        assert_eq!(team.name, "San Diego Padres");
        assert_eq!(team.color.as_deref(), Some("#2f241d"));
        assert_eq!(team.logo.as_deref(), Some("https://a.espncdn.com/mlb.png"));

        let numeric = Team::from_espn(&json!({"id": 3, "name": "Athletics"})).unwrap();
        assert_eq!(numeric.id, "3");
        assert!(Team::from_espn(&json!({"name": "No id"})).is_none());
    }

    #[test]
    fn test_teams_grouped_by_city() {
        let all = AllTeams::from_teams(vec![
            Team { id: "1".into(), location: Some("Boston".into()), ..Team::default() },
            Team { id: "2".into(), location: Some("Boston".into()), ..Team::default() },
            Team { id: "3".into(), location: None, ..Team::default() },
        ]);
        assert_eq!(all.total, 3);
        assert_eq!(all.teams_by_city["Boston"].len(), 2);
        assert_eq!(all.teams_by_city["Unknown"].len(), 1);
    }

    #[test]
    fn test_schedule_range_spans_a_week() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 28).unwrap();
        assert_eq!(schedule_range(today), "20261228-20270104");
    }

    #[test]
    fn test_segment_validation() {
        assert!(validate_segment("league", "college-football").is_ok());
        assert!(validate_segment("league", "../admin").is_err());
        assert!(validate_segment("teamId", "").is_err());
    }

    #[tokio::test]
    async fn test_all_teams_skips_failing_leagues() {
        let app = Router::new().route(
            "/:sport/:league/teams",
            get(|Path((_sport, league)): Path<(String, String)>| async move {
                if league == "nhl" {
                    Err(axum::http::StatusCode::BAD_GATEWAY)
                } else {
                    Ok(Json(teams_payload(&league)))
                }
            }),
        );
        let base = serve(app).await;
        let client = EspnClient::new(reqwest::Client::new(), base);

        let all = client.all_teams().await;
        // 5 healthy leagues x 2 teams
        assert_eq!(all.total, 10);
        assert!(all.teams.iter().all(|t| t.league.as_deref() != Some("nhl")));
        let college = all
            .teams
            .iter()
            .find(|t| t.league.as_deref() == Some("college-football"))
            .unwrap();
        assert_eq!(college.kind, Some(LeagueKind::College));
        assert_eq!(college.league_name.as_deref(), Some("NCAA Football"));
    }

    #[tokio::test]
    async fn test_team_info_tolerates_missing_schedule() {
        let app = Router::new().route(
            "/baseball/mlb/teams/25",
            get(|| async { Json(json!({"team": {"id": "25", "displayName": "San Diego Padres"}})) }),
        );
        let base = serve(app).await;
        let client = EspnClient::new(reqwest::Client::new(), base);

        let info = client
            .team_info("baseball", "mlb", "25", NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(info.team["displayName"], "San Diego Padres");
        assert!(info.schedule.is_none());
    }

    #[tokio::test]
    async fn test_upstream_status_is_mirrored() {
        let app = Router::new().route(
            "/baseball/mlb/scoreboard",
            get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;
        let client = EspnClient::new(reqwest::Client::new(), base);

        let err = client.scoreboard("baseball", "mlb", None).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
    }
}
