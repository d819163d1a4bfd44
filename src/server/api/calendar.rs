// Calendar endpoints - Google Calendar list and merged upcoming events

use super::ApiError;
use crate::server::AppState;
use crate::upstream::calendar::{parse_calendar_ids, CalendarEvents, CalendarList};
use crate::upstream::UpstreamError;
use axum::{extract::Query, extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// JSON array of calendar ids
    pub calendar_ids: Option<String>,
    pub access_token: Option<String>,
}

/// GET /calendar/list - Calendars the user owns or can read
pub async fn calendar_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<CalendarList>, ApiError> {
    state
        .calendar
        .list(params.access_token.as_deref())
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream(e, "Failed to fetch calendar list", json!({"calendars": []})))
}

/// GET /calendar/events - Next 30 days across the given calendars
pub async fn calendar_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<CalendarEvents>, ApiError> {
    let fail = |e: UpstreamError| ApiError::upstream(e, "Internal server error", json!({"events": []}));

    let ids = parse_calendar_ids(params.calendar_ids.as_deref()).map_err(fail)?;
    let events = state
        .calendar
        .events(&ids, params.access_token.as_deref(), Utc::now())
        .await
        .map_err(fail)?;

    if let Some(errors) = &events.errors {
        tracing::debug!(failed = errors.len(), calendars = ids.len(), "Some calendars could not be read");
    }
    Ok(Json(events))
}
