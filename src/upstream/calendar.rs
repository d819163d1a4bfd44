//! Google Calendar aggregator
//!
//! Reads the user's calendar list (OAuth only) and merges upcoming events
//! from several calendars. Each calendar is fetched independently; one
//! failing calendar is reported in `errors` without sinking the rest.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{fetch_json, first_str, parse_timestamp, UpstreamError};

/// How far ahead events are fetched
const WINDOW_DAYS: i64 = 30;
/// Per-calendar and merged cap
pub const MAX_EVENTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSummary {
    pub id: String,
    pub summary: String,
    pub primary: bool,
    pub access_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarList {
    pub calendars: Vec<CalendarSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// `{calendarId}-{eventId}`, unique across calendars
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub description: String,
    pub is_all_day: bool,
    pub calendar_id: String,
}

impl CalendarEvent {
    fn from_google(calendar_id: &str, item: &Value) -> Self {
        let event_id = first_str(item, &["id"]).unwrap_or_default();
        let timed_start = first_str(item, &["start.dateTime"]);
        Self {
            id: format!("{calendar_id}-{event_id}"),
            title: first_str(item, &["summary"]).unwrap_or_else(|| "No Title".to_string()),
            is_all_day: timed_start.is_none(),
            start: timed_start
                .or_else(|| first_str(item, &["start.date"]))
                .unwrap_or_default(),
            end: first_str(item, &["end.dateTime", "end.date"]).unwrap_or_default(),
            location: first_str(item, &["location"]).unwrap_or_default(),
            description: first_str(item, &["description"]).unwrap_or_default(),
            calendar_id: calendar_id.to_string(),
        }
    }
}

/// A calendar that could not be read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFailure {
    pub calendar_id: String,
    pub error: String,
    /// Upstream status when the failure was an HTTP error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvents {
    pub events: Vec<CalendarEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<CalendarFailure>>,
}

impl CalendarEvents {
    /// True when any calendar rejected the access token
    pub fn unauthorized(&self) -> bool {
        self.errors
            .iter()
            .flatten()
            .any(|e| e.status == Some(401))
    }
}

/// Decode the `calendarIds` query parameter (a JSON array of strings)
pub fn parse_calendar_ids(raw: Option<&str>) -> Result<Vec<String>, UpstreamError> {
    let raw = raw
        .filter(|r| !r.is_empty())
        .ok_or_else(|| UpstreamError::InvalidInput("No calendar IDs provided".to_string()))?;
    let ids: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| UpstreamError::InvalidInput("Invalid calendar IDs".to_string()))?;
    if ids.is_empty() {
        return Err(UpstreamError::InvalidInput("Invalid calendar IDs".to_string()));
    }
    Ok(ids)
}

enum Auth<'a> {
    Bearer(&'a str),
    ApiKey(&'a str),
}

#[derive(Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CalendarClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// `base/segments...` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::Decode(format!("bad calendar base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Decode("calendar base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Calendars the token holder owns or can read
    pub async fn list(&self, access_token: Option<&str>) -> Result<CalendarList, UpstreamError> {
        let token = access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| UpstreamError::InvalidInput("Access token required".to_string()))?;

        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let data: Value = fetch_json(self.http.get(url).bearer_auth(token)).await?;

        let calendars = data
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let id = first_str(item, &["id"])?;
                        Some(CalendarSummary {
                            summary: first_str(item, &["summary"]).unwrap_or_else(|| id.clone()),
                            primary: item.get("primary").and_then(Value::as_bool).unwrap_or(false),
                            access_role: first_str(item, &["accessRole"]).unwrap_or_default(),
                            id,
                        })
                    })
                    .filter(|c| c.access_role == "owner" || c.access_role == "reader")
                    .collect()
            })
            .unwrap_or_default();

        Ok(CalendarList { calendars })
    }

    /// Upcoming events from every calendar in `ids`, merged by start time
    pub async fn events(
        &self,
        ids: &[String],
        access_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvents, UpstreamError> {
        let auth = match (access_token.filter(|t| !t.is_empty()), self.api_key.as_deref()) {
            (Some(token), _) => Auth::Bearer(token),
            (None, Some(key)) => Auth::ApiKey(key),
            (None, None) => {
                return Err(UpstreamError::NotConfigured(
                    "No authentication method configured. Please connect your Google account or configure an API key.",
                ))
            }
        };

        let time_min = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let time_max = (now + Duration::days(WINDOW_DAYS)).to_rfc3339_opts(SecondsFormat::Millis, true);

        let fetches = ids.iter().map(|id| {
            let auth = &auth;
            let window = (time_min.as_str(), time_max.as_str());
            async move { (id.as_str(), self.fetch_calendar(id, auth, window).await) }
        });

        let mut events = Vec::new();
        let mut errors = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(mut batch) => events.append(&mut batch),
                Err(e) => {
                    tracing::warn!(calendar = id, error = %e, "Calendar fetch failed");
                    errors.push(CalendarFailure {
                        calendar_id: id.to_string(),
                        status: match &e {
                            UpstreamError::Status { status, .. } => Some(*status),
                            _ => None,
                        },
                        error: match e {
                            UpstreamError::Status { body, .. } if !body.is_empty() => body,
                            other => other.to_string(),
                        },
                    });
                }
            }
        }

        events.sort_by_cached_key(|e| {
            let at = parse_timestamp(&e.start);
            (at.is_none(), at)
        });
        events.truncate(MAX_EVENTS);

        Ok(CalendarEvents {
            events,
            errors: (!errors.is_empty()).then_some(errors),
        })
    }

    async fn fetch_calendar(
        &self,
        calendar_id: &str,
        auth: &Auth<'_>,
        (time_min, time_max): (&str, &str),
    ) -> Result<Vec<CalendarEvent>, UpstreamError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let max = MAX_EVENTS.to_string();
        let mut request = self.http.get(url).query(&[
            ("timeMin", time_min),
            ("timeMax", time_max),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", max.as_str()),
        ]);
        request = match auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ApiKey(key) => request.query(&[("key", key)]),
        };

        let data: Value = fetch_json(request).await?;
        Ok(data
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| CalendarEvent::from_google(calendar_id, item))
                    .collect()
            })
            .unwrap_or_default())
    }
}
