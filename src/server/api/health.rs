// Health endpoint - Liveness plus storage tier status

use crate::server::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Storage tiers in fallback order
    pub tiers: Vec<&'static str>,
    /// Writes that missed the primary tier since startup
    pub fallback_writes: u64,
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let fallback_writes = state.store.fallback_writes();
    Json(HealthResponse {
        status: if fallback_writes == 0 { "ok" } else { "degraded" },
        tiers: state.store.tier_names(),
        fallback_writes,
    })
}
