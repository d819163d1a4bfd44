//! Dashboard HTTP server
//!
//! ```text
//!   browser / headless client
//!            │
//!            ▼
//!   ┌─────────────────┐      ┌──────────────────────────────┐
//!   │  axum router    │ ───► │ preferences store (tiered)   │
//!   │  + TraceLayer   │      └──────────────────────────────┘
//!   └─────────────────┘
//!            │               ┌──────────────────────────────┐
//!            └─────────────► │ ESPN · Ticketmaster · Google │
//!                            │ Calendar · OAuth · wttr.in   │
//!                            └──────────────────────────────┘
//! ```
//!
//! Every upstream failure is answered with the entity's empty shape plus an
//! `error` field, so the dashboard can render "no data" without special cases.

mod api;
mod state;

pub use state::AppState;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::prefs::PreferencesStore;

/// Every route the dashboard exposes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/preferences",
            get(api::get_preferences)
                .post(api::post_preferences)
                .patch(api::patch_preferences),
        )
        // Sports
        .route("/sports/teams", get(api::get_teams))
        .route("/sports/all-teams", get(api::get_all_teams))
        .route("/sports/team-info", get(api::get_team_info))
        .route("/sports/scoreboard", get(api::get_scoreboard))
        .route("/sports/news", get(api::get_news))
        // Concerts, calendar, weather
        .route("/concerts", get(api::get_concerts))
        .route("/calendar/list", get(api::calendar_list))
        .route("/calendar/events", get(api::calendar_events))
        .route("/weather", get(api::get_weather))
        // Google OAuth
        .route("/oauth/authorize", get(api::oauth_authorize))
        .route("/oauth/callback", get(api::oauth_callback))
        .route("/oauth/refresh", post(api::oauth_refresh))
        // Household
        .route("/auth/login", post(api::login))
        .route("/auth/password", post(api::change_password))
        .route("/messages", post(api::post_message))
        .route("/health", get(api::get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the dashboard server
pub async fn start_server(
    config: Config,
    store: Arc<PreferencesStore>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let bind_addr = config.bind_addr;
    let state = AppState::from_config(&config, store)?;

    if !state.ticketmaster.is_configured() {
        tracing::warn!("TICKETMASTER_API_KEY not set, /concerts will report an error");
    }
    if !state.oauth.has_credentials() {
        tracing::warn!("Google OAuth credentials not set, calendar connect is disabled");
    }

    let app = router(state);

    tracing::info!("Starting dashboard server on {}", bind_addr);

    let listener = TcpListener::bind(bind_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Dashboard listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Dashboard server shut down gracefully");
    Ok(())
}
