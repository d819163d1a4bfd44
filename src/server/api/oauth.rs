// OAuth endpoints - Google authorization-code flow and token refresh

use super::ApiError;
use crate::server::AppState;
use crate::upstream::oauth::{callback_redirect, generate_state, CallbackFailure, RefreshedToken};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;

/// Cookie carrying the anti-forgery nonce between authorize and callback
const STATE_COOKIE: &str = "oauth_state";
const STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// GET /oauth/authorize - Set the state cookie and send the browser to Google
pub async fn oauth_authorize(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let nonce = generate_state();
    let url = state
        .oauth
        .authorize_url(&nonce)
        .map_err(|e| ApiError::upstream(e, "Failed to initiate OAuth flow", json!({})))?;

    let cookie = Cookie::build((STATE_COOKIE, nonce))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .max_age(time::Duration::seconds(STATE_TTL_SECS));

    tracing::info!("Starting Google OAuth flow");
    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

/// GET /oauth/callback - Verify state, exchange the code, hand tokens to the dashboard
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let stored = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/"));

    let outcome = complete_callback(&state, params, stored).await;
    let target = match &outcome {
        Ok(grant) => {
            tracing::info!(has_refresh = grant.refresh_token.is_some(), "Google account connected");
            callback_redirect(&state.dashboard_url, Ok(grant))
        }
        Err(failure) => {
            tracing::warn!(reason = failure.code(), "OAuth callback rejected");
            callback_redirect(&state.dashboard_url, Err(failure))
        }
    };

    (jar, Redirect::to(target.as_str())).into_response()
}

async fn complete_callback(
    state: &AppState,
    params: CallbackQuery,
    stored_state: Option<String>,
) -> Result<crate::upstream::oauth::TokenGrant, CallbackFailure> {
    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        return Err(CallbackFailure::Denied(error));
    }
    let (Some(code), Some(returned_state)) = (params.code, params.state) else {
        return Err(CallbackFailure::MissingParameters);
    };
    if stored_state.as_deref() != Some(returned_state.as_str()) {
        return Err(CallbackFailure::InvalidState);
    }
    if !state.oauth.has_credentials() {
        return Err(CallbackFailure::ServerConfig);
    }

    state.oauth.exchange_code(&code).await.map_err(|e| {
        tracing::warn!(error = %e, "Token exchange failed");
        CallbackFailure::TokenExchangeFailed
    })
}

/// POST /oauth/refresh - Trade a refresh token for a new access token
pub async fn oauth_refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshedToken>, ApiError> {
    let token = request.refresh_token.unwrap_or_default();
    state
        .oauth
        .refresh(&token)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream(e, "Failed to refresh token", json!({})))
}
