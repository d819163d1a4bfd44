//! `[logging]` settings for the server and the client commands
//!
//! Console output is always on. The JSON file sink is opt-in and rolls over
//! on the chosen schedule under `file_dir`.

use serde::Deserialize;
use std::path::PathBuf;

/// How often the JSON log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One ever-growing file
    Never,
}

impl LogRotation {
    const NAMES: [(&'static str, LogRotation); 3] = [
        ("hourly", Self::Hourly),
        ("daily", Self::Daily),
        ("never", Self::Never),
    ];

    /// Case-insensitive; anything unrecognised rolls daily
    pub fn from_str(s: &str) -> Self {
        let wanted = s.trim();
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, rotation)| *rotation)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, rotation)| rotation == self)
            .map(|(name, _)| *name)
            .unwrap_or("daily")
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// File name stem, e.g. `dashboard.2026-10-18`
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "dashboard".to_string(),
        }
    }
}

/// `[logging]` table as written in config.toml
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Missing or blank keys keep their defaults
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let Some(file) = file else {
            return Self::default();
        };
        let defaults = Self::default();
        let text = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Self {
            level: text(file.level).unwrap_or(defaults.level),
            file_enabled: file.file_enabled.unwrap_or(defaults.file_enabled),
            file_dir: text(file.file_dir).map_or(defaults.file_dir, PathBuf::from),
            file_rotation: text(file.file_rotation)
                .map_or(defaults.file_rotation, |r| LogRotation::from_str(&r)),
            file_prefix: text(file.file_prefix).unwrap_or(defaults.file_prefix),
        }
    }
}
