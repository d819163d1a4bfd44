//! Proxy aggregators over third-party APIs
//!
//! ```text
//!   server::api ──► upstream::{espn, news, concerts, calendar, oauth, weather}
//!                          │
//!                          └── one shared reqwest::Client (fixed User-Agent)
//! ```
//!
//! Each aggregator turns a loosely shaped upstream payload into the small,
//! stable DTOs defined next to it. The DTOs are shared with the client core,
//! which deserializes the server's responses into the same types.
//!
//! Failures never escape as panics: every call returns `UpstreamError`, which
//! the HTTP layer turns into `{error, <entity>: []}` with a mirrored status.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::UpstreamConfig;

pub mod calendar;
pub mod concerts;
pub mod espn;
pub mod news;
pub mod oauth;
pub mod sports;
pub mod weather;

/// Sent on every upstream request; ESPN rejects some default agents
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; DadDashboard/1.0)";

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status
    #[error("upstream returned {status}")]
    Status { status: u16, body: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected upstream payload: {0}")]
    Decode(String),

    /// A credential or client id this call needs is missing
    #[error("{0}")]
    NotConfigured(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    /// Every fallback was tried and none produced data
    #[error("{0}")]
    Exhausted(String),
}

impl UpstreamError {
    /// HTTP status the proxy answers with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            Self::InvalidInput(_) => 400,
            Self::Transport(_)
            | Self::Decode(_)
            | Self::NotConfigured(_)
            | Self::Exhausted(_) => 500,
        }
    }
}

/// Shared HTTP client for every aggregator
pub fn build_client(config: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(10)
        .build()
}

/// Send a prepared request and decode a JSON body, mapping non-2xx to `Status`
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, UpstreamError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}

/// First non-empty string among `paths` (dot-separated, numeric segments index arrays)
pub(crate) fn first_str(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| {
        lookup(value, path)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Walk a dot path such as `sports.0.leagues.0.teams`
pub(crate) fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match segment.parse::<usize>() {
        Ok(index) => current.get(index),
        Err(_) => current.get(segment),
    })
}

/// Full timestamps, bare dates (midnight UTC) and zone-less local times
pub fn parse_timestamp(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(date) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S") {
        return Some(at.and_utc());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_walks_objects_and_arrays() {
        let value = json!({"sports": [{"leagues": [{"teams": [1, 2]}]}]});
        assert_eq!(
            lookup(&value, "sports.0.leagues.0.teams"),
            Some(&json!([1, 2]))
        );
        assert_eq!(lookup(&value, "sports.1.leagues"), None);
    }

    #[test]
    fn test_first_str_skips_empty_and_missing() {
        let value = json!({"headline": "", "title": "Real title"});
        assert_eq!(
            first_str(&value, &["headline", "title", "name"]),
            Some("Real title".to_string())
        );
        assert_eq!(first_str(&value, &["name"]), None);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2026-07-05T03:00:00Z").is_some());
        assert!(parse_timestamp("2026-07-05T03:00:00-07:00").is_some());
        assert!(parse_timestamp("2026-07-05T03:00:00").is_some());
        assert_eq!(
            parse_timestamp("2026-07-05").map(|d| d.to_rfc3339()),
            Some("2026-07-05T00:00:00+00:00".to_string())
        );
        assert!(parse_timestamp("TBA").is_none());
    }

    #[test]
    fn test_status_codes() {
        let err = UpstreamError::Status {
            status: 404,
            body: String::new(),
        };
        assert_eq!(err.status_code(), 404);
        assert_eq!(UpstreamError::NotConfigured("x").status_code(), 500);
        assert_eq!(UpstreamError::InvalidInput("x".into()).status_code(), 400);
    }
}
