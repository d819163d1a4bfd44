// Messages endpoint - Family members leave notes for the dashboard owner

use super::ApiError;
use crate::prefs::{Message, Section, StoreError};
use crate::server::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub id: String,
}

/// POST /messages - Append an unread message to the inbox
pub async fn post_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.name.trim().is_empty() || request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Name and message are required".to_string()));
    }

    let message = Message::new(&request.name, &request.message, Utc::now());
    let id = message.id.clone();

    state
        .with_store("Failed to save message", move |store| {
            store.update_section(&Section::Messages, |current| {
                let mut inbox: Vec<Value> = match current {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                inbox.push(serde_json::to_value(&message).map_err(StoreError::from)?);
                Ok(Value::Array(inbox))
            })
        })
        .await?;

    tracing::info!(from = %request.name.trim(), "Message received");
    Ok(Json(MessageResponse { success: true, id }))
}
