// Sports endpoints - ESPN teams, team detail, scoreboard and news proxies

use super::ApiError;
use crate::server::AppState;
use crate::upstream::espn::{AllTeams, TeamInfo, TeamsResponse};
use crate::upstream::news::{fetch_news, NewsQuery, NewsResponse};
use axum::{extract::Query, extract::State, Json};
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

fn default_sport() -> String {
    "baseball".to_string()
}

fn default_league() -> String {
    "mlb".to_string()
}

/// `sport` and `league`, defaulting to MLB
#[derive(Debug, Deserialize)]
pub struct LeagueQuery {
    #[serde(default = "default_sport")]
    pub sport: String,
    #[serde(default = "default_league")]
    pub league: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfoQuery {
    pub sport: Option<String>,
    pub league: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreboardQuery {
    #[serde(default = "default_sport")]
    pub sport: String,
    #[serde(default = "default_league")]
    pub league: String,
    /// `YYYYMMDD`
    pub dates: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsParams {
    #[serde(default = "default_sport")]
    pub sport: String,
    #[serde(default = "default_league")]
    pub league: String,
    pub team_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /sports/teams - Teams of one league
pub async fn get_teams(
    State(state): State<AppState>,
    Query(params): Query<LeagueQuery>,
) -> Result<Json<TeamsResponse>, ApiError> {
    let teams = state
        .espn
        .teams(&params.sport, &params.league)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch teams", json!({"teams": []})))?;

    Ok(Json(TeamsResponse {
        teams,
        sport: params.sport,
        league: params.league,
    }))
}

/// GET /sports/all-teams - Every supported league, grouped by city
pub async fn get_all_teams(State(state): State<AppState>) -> Json<AllTeams> {
    let all = state.espn.all_teams().await;
    tracing::debug!(total = all.total, "All-teams listing built");
    Json(all)
}

/// GET /sports/team-info - Team detail plus the coming week's schedule
pub async fn get_team_info(
    State(state): State<AppState>,
    Query(params): Query<TeamInfoQuery>,
) -> Result<Json<TeamInfo>, ApiError> {
    let present = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (Some(sport), Some(league), Some(team_id)) = (
        present(params.sport),
        present(params.league),
        present(params.team_id),
    ) else {
        return Err(ApiError::upstream(
            crate::upstream::UpstreamError::InvalidInput("Missing required parameters".to_string()),
            "Missing required parameters",
            json!({"team": null}),
        ));
    };

    let today = Local::now().date_naive();
    let info = state
        .espn
        .team_info(&sport, &league, &team_id, today)
        .await
        .map_err(|e| {
            ApiError::upstream(e, "Failed to fetch team info", json!({"team": null, "schedule": null}))
        })?;
    Ok(Json(info))
}

/// GET /sports/scoreboard - ESPN scoreboard passed through
pub async fn get_scoreboard(
    State(state): State<AppState>,
    Query(params): Query<ScoreboardQuery>,
) -> Result<Json<Value>, ApiError> {
    let board = state
        .espn
        .scoreboard(&params.sport, &params.league, params.dates.as_deref())
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch scoreboard", json!({"events": []})))?;
    Ok(Json(board))
}

/// GET /sports/news - League or team news, team stories first
pub async fn get_news(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Result<Json<NewsResponse>, ApiError> {
    let query = NewsQuery {
        sport: params.sport,
        league: params.league,
        team_id: params.team_id.filter(|t| !t.is_empty()),
        limit: params.limit,
    };

    let articles = fetch_news(&state.espn, &state.espn_web_url, &query, Utc::now())
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch news", json!({"articles": []})))?;
    Ok(Json(NewsResponse { articles }))
}
