//! Upstream API configuration: base URLs, timeouts, OAuth endpoints, secrets

use serde::Deserialize;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Base URLs for every third-party API the aggregators call
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// ESPN site API root (`{base}/{sport}/{league}/...`)
    pub espn_api_url: String,
    /// ESPN web origin used to resolve relative article links
    pub espn_web_url: String,
    /// Ticketmaster discovery events endpoint
    pub ticketmaster_url: String,
    /// Google Calendar v3 root
    pub calendar_api_url: String,
    /// wttr.in compatible weather service
    pub weather_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            espn_api_url: "https://site.api.espn.com/apis/site/v2/sports".to_string(),
            espn_web_url: "https://www.espn.com".to_string(),
            ticketmaster_url: "https://app.ticketmaster.com/discovery/v2/events.json".to_string(),
            calendar_api_url: "https://www.googleapis.com/calendar/v3".to_string(),
            weather_url: "https://wttr.in".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Upstream settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileUpstream {
    pub espn_api_url: Option<String>,
    pub espn_web_url: Option<String>,
    pub ticketmaster_url: Option<String>,
    pub calendar_api_url: Option<String>,
    pub weather_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl UpstreamConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileUpstream>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            espn_api_url: file.espn_api_url.unwrap_or(defaults.espn_api_url),
            espn_web_url: file.espn_web_url.unwrap_or(defaults.espn_web_url),
            ticketmaster_url: file.ticketmaster_url.unwrap_or(defaults.ticketmaster_url),
            calendar_api_url: file.calendar_api_url.unwrap_or(defaults.calendar_api_url),
            weather_url: file.weather_url.unwrap_or(defaults.weather_url),
            timeout_secs: file.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth
// ─────────────────────────────────────────────────────────────────────────────

/// Google OAuth endpoints and redirect behaviour
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    /// Explicit redirect URI (GOOGLE_REDIRECT_URI); derived from public_url when unset
    pub redirect_uri: Option<String>,
    /// Where the browser lands after the callback
    pub dashboard_path: String,
    /// Mark the state cookie Secure (enable behind HTTPS)
    pub secure_cookies: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: None,
            dashboard_path: "/dashboard".to_string(),
            secure_cookies: false,
        }
    }
}

/// OAuth settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileOAuth {
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub dashboard_path: Option<String>,
    pub secure_cookies: Option<bool>,
}

impl OAuthConfig {
    /// Create from file config with env overrides and defaults
    pub fn from_file(file: Option<FileOAuth>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            authorize_url: file.authorize_url.unwrap_or(defaults.authorize_url),
            token_url: file.token_url.unwrap_or(defaults.token_url),
            redirect_uri: std::env::var("GOOGLE_REDIRECT_URI")
                .ok()
                .filter(|s| !s.is_empty()),
            dashboard_path: file.dashboard_path.unwrap_or(defaults.dashboard_path),
            secure_cookies: file.secure_cookies.unwrap_or(defaults.secure_cookies),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials (env only)
// ─────────────────────────────────────────────────────────────────────────────

/// API keys and OAuth client credentials
#[derive(Clone, Default)]
pub struct Credentials {
    pub ticketmaster_api_key: Option<String>,
    pub google_calendar_api_key: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            ticketmaster_api_key: var("TICKETMASTER_API_KEY"),
            google_calendar_api_key: var("GOOGLE_CALENDAR_API_KEY"),
            google_client_id: var("GOOGLE_CLIENT_ID"),
            google_client_secret: var("GOOGLE_CLIENT_SECRET"),
        }
    }
}

// Secrets never reach logs; only presence is shown.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        f.debug_struct("Credentials")
            .field("ticketmaster_api_key", &present(&self.ticketmaster_api_key))
            .field("google_calendar_api_key", &present(&self.google_calendar_api_key))
            .field("google_client_id", &present(&self.google_client_id))
            .field("google_client_secret", &present(&self.google_client_secret))
            .finish()
    }
}
