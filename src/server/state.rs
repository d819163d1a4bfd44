//! Shared state handed to every route

use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use crate::config::Config;
use crate::prefs::{PreferencesStore, StoreError};
use crate::upstream::calendar::CalendarClient;
use crate::upstream::concerts::TicketmasterClient;
use crate::upstream::espn::EspnClient;
use crate::upstream::oauth::OAuthClient;
use crate::upstream::weather::WeatherClient;
use crate::upstream::build_client;

use super::api::ApiError;

// ─────────────────────────────────────────────────────────────────────────────
// App State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    /// Tiered preference document
    pub(crate) store: Arc<PreferencesStore>,
    pub(crate) espn: EspnClient,
    /// Base for resolving relative article links
    pub(crate) espn_web_url: String,
    pub(crate) ticketmaster: TicketmasterClient,
    pub(crate) calendar: CalendarClient,
    pub(crate) oauth: OAuthClient,
    pub(crate) weather: WeatherClient,
    /// Where the OAuth callback lands the browser
    pub(crate) dashboard_url: Url,
    /// Mark the OAuth state cookie `Secure`
    pub(crate) secure_cookies: bool,
    /// Password accepted when the store cannot be read
    pub(crate) default_password: String,
}

impl AppState {
    pub fn from_config(config: &Config, store: Arc<PreferencesStore>) -> Result<Self> {
        let http = build_client(&config.upstream).context("Failed to create HTTP client")?;
        let upstream = &config.upstream;
        let credentials = &config.credentials;

        let dashboard_url = Url::parse(&config.dashboard_url())
            .with_context(|| format!("Invalid dashboard URL: {}", config.dashboard_url()))?;

        Ok(Self {
            store,
            espn: EspnClient::new(http.clone(), upstream.espn_api_url.clone()),
            espn_web_url: upstream.espn_web_url.clone(),
            ticketmaster: TicketmasterClient::new(
                http.clone(),
                upstream.ticketmaster_url.clone(),
                credentials.ticketmaster_api_key.clone(),
            ),
            calendar: CalendarClient::new(
                http.clone(),
                upstream.calendar_api_url.clone(),
                credentials.google_calendar_api_key.clone(),
            ),
            oauth: OAuthClient::new(
                http.clone(),
                config.oauth.authorize_url.clone(),
                config.oauth.token_url.clone(),
                config.oauth_redirect_uri(),
                credentials.google_client_id.clone(),
                credentials.google_client_secret.clone(),
            ),
            weather: WeatherClient::new(http, upstream.weather_url.clone()),
            dashboard_url,
            secure_cookies: config.oauth.secure_cookies,
            default_password: config.storage.default_password.clone(),
        })
    }

    /// Run a store operation off the async runtime.
    ///
    /// Caller mistakes (bad section shapes) become 400; anything else is
    /// logged and answered with `context` as a 500.
    pub(crate) async fn with_store<T, F>(&self, context: &'static str, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&PreferencesStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("{context}: {e}")))?;

        result.map_err(|e| {
            if e.is_invalid_input() {
                ApiError::BadRequest(e.to_string())
            } else {
                tracing::error!(error = %e, "{}", context);
                ApiError::Internal(context.to_string())
            }
        })
    }
}
