// Concerts endpoint - Ticketmaster Discovery proxy

use super::ApiError;
use crate::server::AppState;
use crate::upstream::concerts::{ConcertQuery, ConcertsResponse};
use crate::upstream::UpstreamError;
use axum::{extract::Query, extract::State, Json};
use chrono::Utc;
use serde_json::json;

/// GET /concerts - Upcoming music events near a city or coordinates
pub async fn get_concerts(
    State(state): State<AppState>,
    Query(query): Query<ConcertQuery>,
) -> Result<Json<ConcertsResponse>, ApiError> {
    match state.ticketmaster.search(&query, Utc::now()).await {
        Ok(response) => {
            tracing::debug!(events = response.events.len(), total = response.total, "Concert search done");
            Ok(Json(response))
        }
        Err(e) => {
            let message = match &e {
                UpstreamError::Status { status, .. } => format!("Ticketmaster API error: {status}"),
                _ => "Failed to fetch events".to_string(),
            };
            Err(ApiError::upstream(e, message, json!({"events": []})))
        }
    }
}
