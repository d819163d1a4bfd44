// HTTP API module - Preference storage and third-party proxies
//
// Every route answers with JSON. Proxy routes never fail at the transport
// level: upstream trouble comes back as `{error, <entity>: <empty>}` with the
// upstream status mirrored, so widgets only ever inspect `error`.

mod auth;
mod calendar;
mod concerts;
mod health;
mod messages;
mod oauth;
mod preferences;
mod sports;
mod weather;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};

use crate::upstream::UpstreamError;

// Re-export endpoint handlers
pub use auth::{change_password, login};
pub use calendar::{calendar_events, calendar_list};
pub use concerts::get_concerts;
pub use health::get_health;
pub use messages::post_message;
pub use oauth::{oauth_authorize, oauth_callback, oauth_refresh};
pub use preferences::{get_preferences, patch_preferences, post_preferences};
pub use sports::{get_all_teams, get_news, get_scoreboard, get_team_info, get_teams};
pub use weather::get_weather;

/// API error responses
/// Converted to HTTP status codes via IntoResponse
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    BadRequest(String),
    Unauthorized(String),
    /// Proxy failure; `empty` holds the entity fields defaulted to empty
    Upstream {
        status: StatusCode,
        message: String,
        empty: Map<String, Value>,
    },
}

impl ApiError {
    /// Wrap an aggregator failure.
    ///
    /// Caller and configuration errors keep their own message; upstream and
    /// transport failures are reported as `message`.
    pub fn upstream(err: UpstreamError, message: impl Into<String>, empty: Value) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(error = %err, status = status.as_u16(), "Upstream call failed");

        let message = match err {
            UpstreamError::InvalidInput(msg) => msg,
            UpstreamError::NotConfigured(msg) => msg.to_string(),
            _ => message.into(),
        };
        let empty = match empty {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::Upstream {
            status,
            message,
            empty,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, mut body) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, Map::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, Map::new()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, Map::new()),
            ApiError::Upstream {
                status,
                message,
                empty,
            } => (status, message, empty),
        };

        if status.is_server_error() {
            tracing::error!("API error: {} - {}", status, message);
        } else {
            tracing::debug!("API error: {} - {}", status, message);
        }

        body.insert("error".to_string(), json!(message));
        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::config::Config;
    use crate::prefs::{FileBackend, PreferencesStore};
    use crate::server::{router, AppState};
    use crate::upstream::test_support::serve;

    /// A running dashboard server over a temp-dir file store
    pub struct TestServer {
        pub base: String,
        pub state: AppState,
        pub http: reqwest::Client,
        _dir: TempDir,
    }

    impl TestServer {
        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }
    }

    /// Serve the router with every upstream pointed at `upstream`
    pub async fn spawn(upstream: &str, configure: impl FnOnce(&mut Config)) -> TestServer {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.upstream.espn_api_url = upstream.to_string();
        config.upstream.espn_web_url = "https://www.espn.com".to_string();
        config.upstream.ticketmaster_url = format!("{upstream}/events.json");
        config.upstream.calendar_api_url = upstream.to_string();
        config.upstream.weather_url = upstream.to_string();
        config.oauth.token_url = format!("{upstream}/token");
        config.credentials = Default::default();
        configure(&mut config);

        let store = Arc::new(PreferencesStore::new(vec![Arc::new(FileBackend::new(
            dir.path().join("user-data.json"),
            "dad2025",
        ))]));
        let state = AppState::from_config(&config, store).unwrap();
        let base = serve(router(state.clone())).await;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        TestServer {
            base,
            state,
            http,
            _dir: dir,
        }
    }
}
