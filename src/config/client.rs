//! Headless client core settings

use serde::Deserialize;
use std::path::PathBuf;

/// Settings for the `snapshot` and `watch` commands
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Dashboard server the client talks to
    pub server_url: String,
    /// Directory that stands in for browser local/session storage
    pub state_dir: PathBuf,
    /// Maximum concurrent per-artist concert lookups
    pub concert_fan_out: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            state_dir: PathBuf::from("./data/client"),
            concert_fan_out: 4,
        }
    }
}

/// Client settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileClient {
    pub server_url: Option<String>,
    pub state_dir: Option<String>,
    pub concert_fan_out: Option<usize>,
}

impl ClientConfig {
    /// Create from file config with env overrides and defaults
    pub fn from_file(file: Option<FileClient>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            server_url: std::env::var("DASHBOARD_SERVER_URL")
                .ok()
                .or(file.server_url)
                .unwrap_or(defaults.server_url),
            state_dir: file
                .state_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            concert_fan_out: file
                .concert_fan_out
                .unwrap_or(defaults.concert_fan_out)
                .max(1),
        }
    }
}
