//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Serialize config to a commented TOML document
    ///
    /// Credentials are intentionally absent: they only come from the environment.
    pub fn to_toml(&self) -> String {
        format!(
            r#"# dad-dashboard configuration
#
# Secrets are read from the environment only:
#   DASHBOARD_PASSWORD, TICKETMASTER_API_KEY, GOOGLE_CALENDAR_API_KEY,
#   GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, GOOGLE_REDIRECT_URI

# HTTP server bind address
bind_addr = "{bind}"

# Origin the browser uses to reach this server (OAuth redirect default)
public_url = "{public_url}"

# Preferences store: database tier (optional) in front of the JSON file tier
[storage]
data_file = "{data_file}"

[storage.database]
enabled = {db_enabled}
path = "{db_path}"
pool_size = {db_pool}

# Third-party APIs
[upstream]
espn_api_url = "{espn_api}"
espn_web_url = "{espn_web}"
ticketmaster_url = "{ticketmaster}"
calendar_api_url = "{calendar}"
weather_url = "{weather}"
timeout_secs = {timeout}

# Google OAuth
[oauth]
authorize_url = "{oauth_authorize}"
token_url = "{oauth_token}"
dashboard_path = "{dashboard_path}"
secure_cookies = {secure_cookies}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
# JSON file logging (in addition to stdout)
file_enabled = {log_file_enabled}
file_dir = "{log_file_dir}"
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = "{log_file_prefix}"

# Headless client (snapshot / watch commands)
[client]
server_url = "{client_server}"
state_dir = "{client_state}"
concert_fan_out = {client_fan_out}
"#,
            bind = self.bind_addr,
            public_url = self.public_url,
            data_file = self.storage.data_file.display(),
            db_enabled = self.storage.database_enabled,
            db_path = self.storage.database_path.display(),
            db_pool = self.storage.database_pool_size,
            espn_api = self.upstream.espn_api_url,
            espn_web = self.upstream.espn_web_url,
            ticketmaster = self.upstream.ticketmaster_url,
            calendar = self.upstream.calendar_api_url,
            weather = self.upstream.weather_url,
            timeout = self.upstream.timeout_secs,
            oauth_authorize = self.oauth.authorize_url,
            oauth_token = self.oauth.token_url,
            dashboard_path = self.oauth.dashboard_path,
            secure_cookies = self.oauth.secure_cookies,
            log_level = self.logging.level,
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = self.logging.file_dir.display(),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = self.logging.file_prefix,
            client_server = self.client.server_url,
            client_state = self.client.state_dir.display(),
            client_fan_out = self.client.concert_fan_out,
        )
    }
}
