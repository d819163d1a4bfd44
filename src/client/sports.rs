//! Sports board: one card per selected team

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::api::{ClientError, DashboardApi};
use crate::prefs::{TeamKey, TeamPreferences};
use crate::upstream::espn::Team;
use crate::upstream::news::Article;
use crate::upstream::sports::{
    game_from_scoreboard, next_game_from_schedule, record_from_team, GameSummary, TeamPalette,
    TeamRecord,
};

/// Headlines shown per team
pub const NEWS_PER_TEAM: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCard {
    pub key: TeamKey,
    pub team: Team,
    pub favorite: bool,
    pub palette: TeamPalette,
    pub record: Option<TeamRecord>,
    /// Today's game, else the next scheduled one
    pub game: Option<GameSummary>,
    pub news: Vec<Article>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SportsBoard {
    pub teams: Vec<TeamCard>,
}

impl SportsBoard {
    /// Any team currently playing
    pub fn has_live(&self) -> bool {
        self.teams
            .iter()
            .any(|card| card.game.as_ref().is_some_and(GameSummary::is_live))
    }
}

/// Build the board for the selected teams.
///
/// Selected keys that all-teams does not know are skipped. Per-team
/// lookups that fail leave that part of the card empty.
pub async fn build_board(
    api: &dyn DashboardApi,
    prefs: &TeamPreferences,
    now: DateTime<Utc>,
) -> Result<SportsBoard, ClientError> {
    if prefs.selected_teams.is_empty() {
        return Ok(SportsBoard::default());
    }

    let directory: HashMap<TeamKey, Team> = api
        .all_teams()
        .await?
        .teams
        .into_iter()
        .filter_map(|team| {
            let key = TeamKey::new(&team.id, team.sport.as_deref()?, team.league.as_deref()?);
            Some((key, team))
        })
        .collect();

    let selected: Vec<(TeamKey, Team)> = prefs
        .selected_teams
        .iter()
        .filter_map(|key| match directory.get(key) {
            Some(team) => Some((key.clone(), team.clone())),
            None => {
                tracing::debug!(team = %key, "Selected team not in the team directory");
                None
            }
        })
        .collect();

    let cards = join_all(
        selected
            .into_iter()
            .map(|(key, team)| team_card(api, key, team, prefs, now)),
    )
    .await;

    let mut teams: Vec<TeamCard> = cards;
    teams.sort_by(|a, b| {
        b.favorite
            .cmp(&a.favorite)
            .then_with(|| a.team.name.to_lowercase().cmp(&b.team.name.to_lowercase()))
    });

    Ok(SportsBoard { teams })
}

async fn team_card(
    api: &dyn DashboardApi,
    key: TeamKey,
    team: Team,
    prefs: &TeamPreferences,
    now: DateTime<Utc>,
) -> TeamCard {
    let sport = team.sport.clone().unwrap_or_default();
    let league = team.league.clone().unwrap_or_default();
    let today = now.format("%Y%m%d").to_string();

    let (news, info, scoreboard) = futures::join!(
        api.news(&sport, &league, &team.id, NEWS_PER_TEAM),
        api.team_info(&sport, &league, &team.id),
        api.scoreboard(&sport, &league, &today),
    );

    let news = news.unwrap_or_else(|e| {
        tracing::debug!(team = %key, error = %e, "No news");
        Vec::new()
    });

    let (record, schedule) = match info {
        Ok(info) => (record_from_team(&info.team), info.schedule),
        Err(e) => {
            tracing::debug!(team = %key, error = %e, "No team info");
            (None, None)
        }
    };

    let game = scoreboard
        .ok()
        .and_then(|board| game_from_scoreboard(&board, &team.id))
        .or_else(|| {
            schedule
                .as_ref()
                .and_then(|schedule| next_game_from_schedule(schedule, now))
        });

    TeamCard {
        favorite: prefs.favorite_teams.contains(&key),
        palette: TeamPalette::new(team.color.as_deref(), team.alternate_color.as_deref()),
        key,
        team,
        record,
        game,
        news,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::test_support::FakeApi;
    use crate::upstream::espn::{AllTeams, TeamInfo};
    use crate::upstream::sports::{GameState, DEFAULT_PRIMARY};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-18T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn team(id: &str, name: &str, sport: &str, league: &str, color: Option<&str>) -> Team {
        Team {
            id: id.to_string(),
            name: name.to_string(),
            color: color.map(str::to_string),
            sport: Some(sport.to_string()),
            league: Some(league.to_string()),
            ..Team::default()
        }
    }

    fn directory() -> AllTeams {
        AllTeams::from_teams(vec![
            team("25", "San Diego Padres", "baseball", "mlb", Some("#2F241D")),
            team("24", "Los Angeles Chargers", "football", "nfl", None),
            team("21", "San Diego State Aztecs", "football", "college-football", None),
        ])
    }

    fn prefs(selected: &[&str], favorite: &[&str]) -> TeamPreferences {
        TeamPreferences {
            selected_teams: selected.iter().map(|k| TeamKey::from(*k)).collect::<Vec<_>>().into(),
            favorite_teams: favorite.iter().map(|k| TeamKey::from(*k)).collect::<Vec<_>>().into(),
        }
    }

    fn live_scoreboard() -> serde_json::Value {
        json!({"events": [{
            "id": "401",
            "date": "2026-10-18T17:10Z",
            "status": {"type": {"name": "STATUS_IN_PROGRESS", "state": "in", "shortDetail": "Top 5th"}},
            "competitions": [{"competitors": [
                {"homeAway": "home", "score": "3", "team": {"id": "25", "displayName": "San Diego Padres"}},
                {"homeAway": "away", "score": "1", "team": {"id": "19", "displayName": "Los Angeles Dodgers"}},
            ]}],
        }]})
    }

    #[tokio::test]
    async fn test_favourites_first_then_by_name() {
        let api = FakeApi {
            all_teams: Ok(directory()),
            ..FakeApi::default()
        };
        let prefs = prefs(
            &["24-football-nfl", "21-football-college-football", "25-baseball-mlb", "99-hockey-nhl"],
            &["25-baseball-mlb"],
        );

        let board = build_board(&api, &prefs, now()).await.unwrap();
        let names: Vec<_> = board.teams.iter().map(|c| c.team.name.as_str()).collect();
        assert_eq!(
            names,
            ["San Diego Padres", "Los Angeles Chargers", "San Diego State Aztecs"]
        );
        assert!(board.teams[0].favorite);
        assert_eq!(board.teams[0].palette.primary, "#2F241D");
        assert_eq!(board.teams[1].palette.primary, DEFAULT_PRIMARY);
        assert!(api.calls().contains(&"news:25:3".to_string()));
        assert!(api.calls().contains(&"scoreboard:20261018".to_string()));
    }

    #[tokio::test]
    async fn test_live_game_from_scoreboard() {
        let api = FakeApi {
            all_teams: Ok(directory()),
            scoreboard: Ok(live_scoreboard()),
            ..FakeApi::default()
        };
        let board = build_board(&api, &prefs(&["25-baseball-mlb"], &[]), now())
            .await
            .unwrap();

        assert!(board.has_live());
        let game = board.teams[0].game.as_ref().unwrap();
        assert_eq!(game.state, GameState::Live);
        assert_eq!(game.competitors[0].score, Some(3));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_scheduled_game() {
        let api = FakeApi {
            all_teams: Ok(directory()),
            team_info: Ok(TeamInfo {
                team: json!({"id": "25", "record": {"items": [{
                    "summary": "90-72",
                    "stats": [{"name": "wins", "value": 90.0}, {"name": "losses", "value": 72.0}],
                }]}}),
                schedule: Some(json!({"events": [
                    {"id": "old", "date": "2026-10-17T02:10Z",
                     "competitions": [{"status": {"type": {"name": "STATUS_FINAL", "completed": true}}, "competitors": []}]},
                    {"id": "next", "date": "2026-10-20T02:10Z",
                     "competitions": [{"status": {"type": {"name": "STATUS_SCHEDULED", "state": "pre"}}, "competitors": []}]},
                ]})),
            }),
            ..FakeApi::default()
        };
        let board = build_board(&api, &prefs(&["25-baseball-mlb"], &[]), now())
            .await
            .unwrap();

        let card = &board.teams[0];
        assert!(!board.has_live());
        assert_eq!(card.game.as_ref().unwrap().id, "next");
        assert_eq!(card.record.as_ref().unwrap().wins, Some(90));
        assert_eq!(card.record.as_ref().unwrap().summary.as_deref(), Some("90-72"));
    }

    #[tokio::test]
    async fn test_no_selection_makes_no_calls() {
        let api = FakeApi::default();
        let board = build_board(&api, &prefs(&[], &[]), now()).await.unwrap();
        assert!(board.teams.is_empty());
        assert!(api.calls().is_empty());
    }
}
