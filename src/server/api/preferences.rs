// Preferences endpoints - Read and write sections of the preference document

use super::ApiError;
use crate::prefs::Section;
use crate::server::AppState;
use axum::{extract::Query, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const READ_FAILED: &str = "Failed to read user data";
const WRITE_FAILED: &str = "Failed to update user data";

/// Query parameters for GET /preferences
#[derive(Debug, Deserialize)]
pub struct PreferencesQuery {
    pub section: Option<String>,
}

/// Body of POST /preferences
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub section: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Body of PATCH /preferences
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub section: Option<String>,
    pub updates: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn section_name(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// GET /preferences - Whole document (redacted) or `{section: value}`
pub async fn get_preferences(
    State(state): State<AppState>,
    Query(params): Query<PreferencesQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = match section_name(params.section) {
        Some(name) => {
            let section = Section::parse(&name);
            state
                .with_store(READ_FAILED, move |store| store.read_section(&section))
                .await?
        }
        None => state.with_store(READ_FAILED, |store| store.read_all()).await?,
    };
    Ok(Json(value))
}

/// POST /preferences - Replace one section
pub async fn post_preferences(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let name = section_name(request.section)
        .ok_or_else(|| ApiError::BadRequest("Section parameter required".to_string()))?;
    let section = Section::parse(&name);

    let receipt = state
        .with_store(WRITE_FAILED, move |store| store.write_section(&section, request.data))
        .await?;
    tracing::debug!(section = %name, tier = receipt.tier, "Section replaced");

    Ok(Json(SuccessResponse { success: true }))
}

/// PATCH /preferences - Shallow-merge `updates` into one section
pub async fn patch_preferences(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let missing = || ApiError::BadRequest("Section and updates parameters required".to_string());
    let name = section_name(request.section).ok_or_else(missing)?;
    let updates: Map<String, Value> = match request.updates {
        Some(Value::Object(map)) => map,
        _ => return Err(missing()),
    };
    let section = Section::parse(&name);

    let receipt = state
        .with_store(WRITE_FAILED, move |store| store.merge_section(&section, updates))
        .await?;
    tracing::debug!(section = %name, tier = receipt.tier, "Section merged");

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::spawn;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_bulk_read_is_redacted() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        server
            .http
            .post(server.url("/preferences"))
            .json(&json!({"section": "calendarPreferences",
                          "data": {"calendarIds": ["primary"], "accessToken": "secret-token"}}))
            .send()
            .await
            .unwrap();

        let doc: Value = server
            .http
            .get(server.url("/preferences"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(doc.get("password").is_none());
        assert_eq!(doc["calendarPreferences"]["accessToken"], "***");
        assert!(doc["calendarPreferences"].get("refreshToken").is_none());
        assert_eq!(doc["teamPreferences"]["selectedTeams"], json!(["25-baseball-mlb"]));
    }

    #[tokio::test]
    async fn test_section_write_then_read() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        let response = server
            .http
            .post(server.url("/preferences"))
            .json(&json!({"section": "notes", "data": [
                {"id": "n1", "content": "Buy milk", "color": "yellow", "created_at": "2026-01-01T00:00:00Z"}
            ]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"success": true}));

        let notes: Value = server
            .http
            .get(server.url("/preferences?section=notes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(notes["notes"][0]["content"], "Buy milk");
    }

    #[tokio::test]
    async fn test_patch_merges_and_validates() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        let response = server
            .http
            .patch(server.url("/preferences"))
            .json(&json!({"section": "appearancePreferences", "updates": {"darkMode": true}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let section: Value = server
            .http
            .get(server.url("/preferences?section=appearancePreferences"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(section["appearancePreferences"]["darkMode"], true);
        assert_eq!(section["appearancePreferences"]["showWeather"], true);

        let missing = server
            .http
            .patch(server.url("/preferences"))
            .json(&json!({"section": "appearancePreferences"}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 400);
    }

    #[tokio::test]
    async fn test_bad_bodies_are_rejected() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        let no_section = server
            .http
            .post(server.url("/preferences"))
            .json(&json!({"data": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(no_section.status(), 400);

        let wrong_shape = server
            .http
            .post(server.url("/preferences"))
            .json(&json!({"section": "messages", "data": "not a list"}))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_shape.status(), 400);
        let body: Value = wrong_shape.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("messages"));
    }

    #[tokio::test]
    async fn test_motivation_section_round_trip() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        server
            .http
            .post(server.url("/preferences"))
            .json(&json!({"section": "dailyMotivation",
                          "data": {"motivation": "Keep going", "date": "2026-10-17"}}))
            .send()
            .await
            .unwrap();
        let view: Value = server
            .http
            .get(server.url("/preferences?section=dailyMotivation"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["dailyMotivation"], "Keep going");
        assert_eq!(view["dailyMotivationDate"], "2026-10-17");
    }
}
