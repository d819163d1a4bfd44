//! Google OAuth 2.0 authorization-code flow for read-only calendar access
//!
//! ```text
//!   /oauth/authorize ──302──► Google consent ──302──► /oauth/callback
//!         │ sets oauth_state                              │ checks oauth_state
//!         ▼                                               ▼
//!   generate_state()                          exchange_code() ──► dashboard?tokens
//! ```

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{fetch_json, UpstreamError};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
/// Length of the anti-forgery nonce
pub const STATE_LEN: usize = 26;
/// Assumed lifetime when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Random alphanumeric anti-forgery nonce
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN
}

/// Token endpoint answer for `grant_type=authorization_code`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

/// Body of `POST /oauth/refresh`, also what the client receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

/// Why a callback could not complete; the code lands in `?oauth_error=`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// Google reported an error (user denied consent, ...)
    Denied(String),
    MissingParameters,
    InvalidState,
    ServerConfig,
    TokenExchangeFailed,
}

impl CallbackFailure {
    pub fn code(&self) -> &str {
        match self {
            Self::Denied(code) => code.as_str(),
            Self::MissingParameters => "missing_parameters",
            Self::InvalidState => "invalid_state",
            Self::ServerConfig => "server_config_error",
            Self::TokenExchangeFailed => "token_exchange_failed",
        }
    }
}

/// Dashboard URL carrying either the tokens or the failure code
pub fn callback_redirect(dashboard: &Url, outcome: Result<&TokenGrant, &CallbackFailure>) -> Url {
    let mut url = dashboard.clone();
    {
        let mut query = url.query_pairs_mut();
        match outcome {
            Ok(grant) => {
                query.append_pair("oauth_success", "true");
                query.append_pair("access_token", &grant.access_token);
                if let Some(refresh) = &grant.refresh_token {
                    query.append_pair("refresh_token", refresh);
                }
                query.append_pair("expires_in", &grant.expires_in.to_string());
            }
            Err(failure) => {
                query.append_pair("oauth_error", failure.code());
            }
        }
    }
    url
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    redirect_uri: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl OAuthClient {
    pub fn new(
        http: reqwest::Client,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        redirect_uri: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            http,
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            redirect_uri: redirect_uri.into(),
            client_id: client_id.filter(|s| !s.is_empty()),
            client_secret: client_secret.filter(|s| !s.is_empty()),
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.client_id.as_deref()?, self.client_secret.as_deref()?))
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    /// Consent-screen URL for `state`
    pub fn authorize_url(&self, state: &str) -> Result<Url, UpstreamError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("Google OAuth client ID not configured"))?;

        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| UpstreamError::Decode(format!("bad authorize URL: {e}")))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, UpstreamError> {
        let (client_id, client_secret) = self
            .credentials()
            .ok_or(UpstreamError::NotConfigured("OAuth credentials not configured"))?;

        fetch_json(self.http.post(&self.token_url).form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ]))
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, UpstreamError> {
        if refresh_token.is_empty() {
            return Err(UpstreamError::InvalidInput("Refresh token required".to_string()));
        }
        let (client_id, client_secret) = self
            .credentials()
            .ok_or(UpstreamError::NotConfigured("OAuth credentials not configured"))?;

        fetch_json(self.http.post(&self.token_url).form(&[
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
        ]))
        .await
    }
}
