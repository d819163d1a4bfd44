//! Configuration for the dashboard server and client core
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/dad-dashboard/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! Credentials (API keys, OAuth client secret, dashboard password) are read
//! from the environment only and never written to the config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod client;
mod observability;
mod serialization;
mod storage;
mod upstream;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use client::{ClientConfig, FileClient};
pub use observability::{FileLogging, LogRotation, LoggingConfig};
pub use storage::{FileDatabase, FileStorage, StorageConfig};
pub use upstream::{Credentials, FileOAuth, FileUpstream, OAuthConfig, UpstreamConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bind address used when neither env nor file set one
const DEFAULT_BIND: &str = "127.0.0.1:3000";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_addr: SocketAddr,

    /// Externally visible origin of the server (OAuth redirect default)
    pub public_url: String,

    /// Preferences store tiers
    pub storage: StorageConfig,

    /// Upstream API locations and timeouts
    pub upstream: UpstreamConfig,

    /// Google OAuth endpoints and redirect behaviour
    pub oauth: OAuthConfig,

    /// Secrets from the environment
    pub credentials: Credentials,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Headless client core settings (snapshot / watch)
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            public_url: "http://localhost:3000".to_string(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            oauth: OAuthConfig::default(),
            credentials: Credentials::default(),
            logging: LoggingConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub bind_addr: Option<String>,
    pub public_url: Option<String>,

    /// Optional [storage] section
    pub storage: Option<FileStorage>,

    /// Optional [upstream] section
    pub upstream: Option<FileUpstream>,

    /// Optional [oauth] section
    pub oauth: Option<FileOAuth>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,

    /// Optional [client] section
    pub client: Option<FileClient>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/dad-dashboard/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::home_dir().map(|p| {
            p.join(".config")
                .join("dad-dashboard")
                .join("config.toml")
        })
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Load file config if it exists
    ///
    /// # Exits
    /// If the config file exists but cannot be parsed. A broken config should
    /// fail fast with a clear error instead of silently using defaults.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match Self::parse_file_config(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                    eprintln!("║  CONFIG ERROR - Failed to parse configuration file          ║");
                    eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  To reset, run `dad-dashboard config --reset`.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    pub(crate) fn parse_file_config(contents: &str) -> Result<FileConfig, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load configuration: file -> env vars -> defaults
    pub fn from_env() -> Result<Self> {
        Self::from_file_config(Self::load_file_config())
    }

    /// Resolve a parsed file layer against the environment
    pub(crate) fn from_file_config(file: FileConfig) -> Result<Self> {
        // Bind address: env > file > default
        let bind_raw = std::env::var("DASHBOARD_BIND")
            .ok()
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("Invalid bind address: {bind_raw}"))?;

        // Public origin: env > file > derived from bind address
        let public_url = std::env::var("DASHBOARD_PUBLIC_URL")
            .ok()
            .or(file.public_url)
            .unwrap_or_else(|| format!("http://{bind_raw}"));

        let credentials = Credentials::from_env();

        Ok(Self {
            bind_addr,
            public_url,
            storage: StorageConfig::from_file(file.storage),
            upstream: UpstreamConfig::from_file(file.upstream),
            oauth: OAuthConfig::from_file(file.oauth),
            credentials,
            logging: LoggingConfig::from_file(file.logging),
            client: ClientConfig::from_file(file.client),
        })
    }

    /// Redirect URI handed to Google: explicit override or `{public_url}/oauth/callback`
    pub fn oauth_redirect_uri(&self) -> String {
        self.oauth
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/callback", self.public_url.trim_end_matches('/')))
    }

    /// Where the OAuth callback sends the browser back to
    pub fn dashboard_url(&self) -> String {
        format!(
            "{}{}",
            self.public_url.trim_end_matches('/'),
            self.oauth.dashboard_path
        )
    }
}
