// Auth endpoints - Dashboard password gate

use super::ApiError;
use crate::prefs::Section;
use crate::server::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shortest password the settings page accepts
const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
}

/// Stored password, or the configured default when the store is unreadable
async fn current_password(state: &AppState) -> Result<String, ApiError> {
    let stored = state
        .with_store("Failed to read password", |store| {
            Ok(store.section_value(&Section::Password).ok())
        })
        .await?;

    Ok(match stored {
        Some(Value::String(password)) => password,
        _ => state.default_password.clone(),
    })
}

/// POST /auth/login - Check the dashboard password
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let success = !request.password.is_empty() && request.password == current_password(&state).await?;
    if !success {
        tracing::info!("Rejected dashboard login");
    }
    Ok(Json(AuthResponse { success }))
}

/// POST /auth/password - Replace the password after verifying the current one
pub async fn change_password(
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if request.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if request.current_password != current_password(&state).await? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let new_password = Value::String(request.new_password);
    state
        .with_store("Failed to change password", move |store| {
            store.write_section(&Section::Password, new_password)
        })
        .await?;
    tracing::info!("Dashboard password changed");

    Ok(Json(AuthResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::spawn;
    use serde_json::{json, Value};

    async fn login(server: &super::super::test_support::TestServer, password: &str) -> bool {
        let body: Value = server
            .http
            .post(server.url("/auth/login"))
            .json(&json!({"password": password}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["success"].as_bool().unwrap()
    }

    #[tokio::test]
    async fn test_login_and_change_password() {
        let server = spawn("http://127.0.0.1:9", |_| {}).await;
        assert!(login(&server, "dad2025").await);
        assert!(!login(&server, "guess").await);

        let wrong = server
            .http
            .post(server.url("/auth/password"))
            .json(&json!({"currentPassword": "guess", "newPassword": "hunter22"}))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);

        let short = server
            .http
            .post(server.url("/auth/password"))
            .json(&json!({"currentPassword": "dad2025", "newPassword": "abc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(short.status(), 400);

        let ok = server
            .http
            .post(server.url("/auth/password"))
            .json(&json!({"currentPassword": "dad2025", "newPassword": "hunter22"}))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);
        assert!(login(&server, "hunter22").await);
        assert!(!login(&server, "dad2025").await);
    }
}
