//! Preferences store configuration: file tier and optional database tier

use serde::Deserialize;
use std::path::PathBuf;

/// Password seeded into a freshly created preference document
pub const DEFAULT_PASSWORD: &str = "dad2025";

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// JSON document used as the local file tier
    pub data_file: PathBuf,
    /// Whether the database tier sits in front of the file tier
    pub database_enabled: bool,
    /// SQLite database file for the database tier
    pub database_path: PathBuf,
    /// Connection pool size for the database tier
    pub database_pool_size: u32,
    /// Password written into defaults (DASHBOARD_PASSWORD env only)
    pub default_password: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("./data/user-data.json"),
            database_enabled: false,
            database_path: PathBuf::from("./data/dashboard.db"),
            database_pool_size: 4,
            default_password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Storage settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileStorage {
    pub data_file: Option<String>,
    pub database: Option<FileDatabase>,
}

/// `[storage.database]` table
#[derive(Debug, Deserialize, Default)]
pub struct FileDatabase {
    pub enabled: Option<bool>,
    pub path: Option<String>,
    pub pool_size: Option<u32>,
}

impl StorageConfig {
    /// Create from file config with env overrides and defaults
    pub fn from_file(file: Option<FileStorage>) -> Self {
        let file = file.unwrap_or_default();
        let database = file.database.unwrap_or_default();
        let defaults = Self::default();

        let data_file = std::env::var("DASHBOARD_DATA_FILE")
            .ok()
            .or(file.data_file)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        // Setting the database path through env implies enabling the tier
        let env_db_path = std::env::var("DASHBOARD_DATABASE_PATH").ok();
        let database_enabled = env_db_path.is_some() || database.enabled.unwrap_or(false);
        let database_path = env_db_path
            .or(database.path)
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let default_password = std::env::var("DASHBOARD_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.default_password);

        Self {
            data_file,
            database_enabled,
            database_path,
            database_pool_size: database
                .pool_size
                .unwrap_or(defaults.database_pool_size)
                .max(1),
            default_password,
        }
    }
}
