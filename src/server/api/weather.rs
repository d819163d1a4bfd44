// Weather endpoint - Current conditions by coordinates or place name

use super::ApiError;
use crate::server::AppState;
use crate::upstream::weather::{WeatherQuery, WeatherReport};
use axum::{extract::Query, extract::State, Json};
use serde_json::json;

/// GET /weather - Current conditions (defaults to San Diego)
pub async fn get_weather(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<WeatherReport>, ApiError> {
    state
        .weather
        .current(&query)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream(e, "Failed to fetch weather", json!({})))
}
