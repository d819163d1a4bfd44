//! The client's view of the dashboard server
//!
//! Everything the client core needs from the server goes through
//! [`DashboardApi`], so session and cache logic can be driven against an
//! in-memory fake as easily as against a running server.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::upstream::calendar::{CalendarEvents, CalendarList};
use crate::upstream::concerts::{ConcertQuery, ConcertsResponse};
use crate::upstream::espn::{AllTeams, TeamInfo};
use crate::upstream::news::{Article, NewsResponse};
use crate::upstream::oauth::RefreshedToken;
use crate::upstream::weather::{WeatherQuery, WeatherReport};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    /// The Google session cannot be renewed; the user has to reconnect
    #[error("{0}")]
    SessionExpired(&'static str),

    /// The OAuth redirect reported a failure code
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("local storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Whole preference document, tokens redacted
    async fn preferences(&self) -> Result<Value, ClientError>;

    /// Stored value of one section (unwrapped from `{section: value}`)
    async fn section(&self, section: &str) -> Result<Value, ClientError>;

    /// Replace one section
    async fn save_section(&self, section: &str, data: &Value) -> Result<(), ClientError>;

    async fn weather(&self, query: &WeatherQuery) -> Result<WeatherReport, ClientError>;

    async fn all_teams(&self) -> Result<AllTeams, ClientError>;

    async fn team_info(&self, sport: &str, league: &str, team_id: &str)
        -> Result<TeamInfo, ClientError>;

    async fn scoreboard(&self, sport: &str, league: &str, dates: &str)
        -> Result<Value, ClientError>;

    async fn news(
        &self,
        sport: &str,
        league: &str,
        team_id: &str,
        limit: usize,
    ) -> Result<Vec<Article>, ClientError>;

    async fn concerts(&self, query: &ConcertQuery) -> Result<ConcertsResponse, ClientError>;

    async fn calendar_list(&self, access_token: &str) -> Result<CalendarList, ClientError>;

    async fn calendar_events(
        &self,
        calendar_ids: &[String],
        access_token: Option<&str>,
    ) -> Result<CalendarEvents, ClientError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedToken, ClientError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────────────────────────

/// [`DashboardApi`] over HTTP with reqwest
#[derive(Clone)]
pub struct HttpDashboardApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDashboardApi {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            // The server always answers failures with an `error` field
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ClientError> {
        self.decode(self.http.get(self.url(path)).query(query)).await
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn preferences(&self) -> Result<Value, ClientError> {
        self.decode(self.http.get(self.url("/preferences"))).await
    }

    async fn section(&self, section: &str) -> Result<Value, ClientError> {
        let mut body: Value = self.get("/preferences", &[("section", section)]).await?;
        Ok(body
            .get_mut(section)
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn save_section(&self, section: &str, data: &Value) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.url("/preferences"))
            .json(&json!({"section": section, "data": data}));
        let _: Value = self.decode(request).await?;
        Ok(())
    }

    async fn weather(&self, query: &WeatherQuery) -> Result<WeatherReport, ClientError> {
        self.get("/weather", query).await
    }

    async fn all_teams(&self) -> Result<AllTeams, ClientError> {
        self.decode(self.http.get(self.url("/sports/all-teams"))).await
    }

    async fn team_info(
        &self,
        sport: &str,
        league: &str,
        team_id: &str,
    ) -> Result<TeamInfo, ClientError> {
        self.get(
            "/sports/team-info",
            &[("sport", sport), ("league", league), ("teamId", team_id)],
        )
        .await
    }

    async fn scoreboard(&self, sport: &str, league: &str, dates: &str) -> Result<Value, ClientError> {
        self.get(
            "/sports/scoreboard",
            &[("sport", sport), ("league", league), ("dates", dates)],
        )
        .await
    }

    async fn news(
        &self,
        sport: &str,
        league: &str,
        team_id: &str,
        limit: usize,
    ) -> Result<Vec<Article>, ClientError> {
        let limit = limit.to_string();
        let body: NewsResponse = self
            .get(
                "/sports/news",
                &[
                    ("sport", sport),
                    ("league", league),
                    ("teamId", team_id),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        Ok(body.articles)
    }

    async fn concerts(&self, query: &ConcertQuery) -> Result<ConcertsResponse, ClientError> {
        self.get("/concerts", query).await
    }

    async fn calendar_list(&self, access_token: &str) -> Result<CalendarList, ClientError> {
        self.get("/calendar/list", &[("accessToken", access_token)]).await
    }

    async fn calendar_events(
        &self,
        calendar_ids: &[String],
        access_token: Option<&str>,
    ) -> Result<CalendarEvents, ClientError> {
        let ids = serde_json::to_string(calendar_ids).map_err(|e| ClientError::Decode(e.to_string()))?;
        let mut query = vec![("calendarIds", ids.as_str())];
        if let Some(token) = access_token {
            query.push(("accessToken", token));
        }
        self.get("/calendar/events", &query).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedToken, ClientError> {
        let request = self
            .http
            .post(self.url("/oauth/refresh"))
            .json(&json!({"refreshToken": refresh_token}));
        self.decode(request).await
    }
}
