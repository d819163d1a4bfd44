//! Database tier: a single row in `user_preferences`
//!
//! Every section is a JSON-text column on one row keyed by the implicit
//! single-tenant id. Sections without a dedicated column are merged into the
//! `extra` object column. `updated_at` is bumped on every write.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::backend::{Document, PreferenceBackend};
use super::document::PreferenceDocument;
use super::section::{column_for_key, COLUMNS};
use super::StoreError;

/// Row key of the only tenant
pub const DEFAULT_USER_ID: &str = "default";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_preferences (
    user_id TEXT PRIMARY KEY,
    password TEXT,
    team_preferences TEXT,
    appearance_preferences TEXT,
    concert_preferences TEXT,
    calendar_preferences TEXT,
    messages TEXT,
    notes TEXT,
    daily_motivation TEXT,
    daily_motivation_date TEXT,
    daily_motivation_data TEXT,
    extra TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub struct DatabaseBackend {
    pool: Pool<SqliteConnectionManager>,
    default_password: String,
}

impl DatabaseBackend {
    /// Open (or create) the database and apply the schema
    pub fn open(
        db_path: impl AsRef<Path>,
        pool_size: u32,
        default_password: impl Into<String>,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout=5000;"));
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            pool,
            default_password: default_password.into(),
        })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Insert the defaults row unless it already exists
    fn ensure_row(&self, conn: &Connection) -> Result<(), StoreError> {
        let defaults = PreferenceDocument::default_map(&self.default_password);
        let now = chrono::Utc::now().to_rfc3339();

        let encoded: Vec<Option<String>> = COLUMNS
            .iter()
            .map(|(key, _)| encode(defaults.get(*key)))
            .collect::<Result<_, _>>()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO user_preferences (
                user_id, password, team_preferences, appearance_preferences,
                concert_preferences, calendar_preferences, messages, notes,
                daily_motivation, daily_motivation_date, daily_motivation_data,
                extra, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, '{}', ?12, ?12)",
            params![
                DEFAULT_USER_ID,
                encoded[0],
                encoded[1],
                encoded[2],
                encoded[3],
                encoded[4],
                encoded[5],
                encoded[6],
                encoded[7],
                encoded[8],
                encoded[9],
                now,
            ],
        )?;

        if inserted > 0 {
            tracing::info!("Created preference row with defaults");
        }
        Ok(())
    }

    fn read_row(&self, conn: &Connection) -> Result<Option<Document>, StoreError> {
        let select = format!(
            "SELECT {}, extra FROM user_preferences WHERE user_id = ?1",
            COLUMNS
                .iter()
                .map(|(_, col)| *col)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let raw: Option<(Vec<Option<String>>, String)> = conn
            .query_row(&select, params![DEFAULT_USER_ID], |row| {
                let mut cols = Vec::with_capacity(COLUMNS.len());
                for i in 0..COLUMNS.len() {
                    cols.push(row.get::<_, Option<String>>(i)?);
                }
                let extra: String = row.get(COLUMNS.len())?;
                Ok((cols, extra))
            })
            .optional()?;

        let Some((cols, extra)) = raw else {
            return Ok(None);
        };

        let mut doc = Document::new();
        if let Value::Object(extra) = serde_json::from_str(&extra)? {
            doc.extend(extra);
        }
        for ((key, _), text) in COLUMNS.iter().zip(cols) {
            let value = match text {
                Some(text) => serde_json::from_str(&text)?,
                None => Value::Null,
            };
            doc.insert((*key).to_string(), value);
        }
        Ok(Some(doc))
    }
}

fn encode(value: Option<&Value>) -> Result<Option<String>, serde_json::Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::to_string(v).map(Some),
    }
}

impl PreferenceBackend for DatabaseBackend {
    fn name(&self) -> &'static str {
        "database"
    }

    fn load(&self) -> Result<Document, StoreError> {
        let conn = self.conn()?;
        if let Some(doc) = self.read_row(&conn)? {
            return Ok(doc);
        }
        self.ensure_row(&conn)?;
        self.read_row(&conn)?.ok_or(StoreError::MissingRow)
    }

    fn write_fields(&self, fields: &[(String, Value)]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        self.ensure_row(&conn)?;

        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut extra_updates = Map::new();

        for (key, value) in fields {
            match column_for_key(key) {
                Some(column) => {
                    // Column names come from the fixed table, never from input
                    let sql = format!(
                        "UPDATE user_preferences SET {column} = ?1, updated_at = ?2 WHERE user_id = ?3"
                    );
                    tx.execute(&sql, params![encode(Some(value))?, now, DEFAULT_USER_ID])?;
                }
                None => {
                    extra_updates.insert(key.clone(), value.clone());
                }
            }
        }

        if !extra_updates.is_empty() {
            let current: String = tx.query_row(
                "SELECT extra FROM user_preferences WHERE user_id = ?1",
                params![DEFAULT_USER_ID],
                |row| row.get(0),
            )?;
            let mut extra = match serde_json::from_str(&current)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            extra.extend(extra_updates);
            tx.execute(
                "UPDATE user_preferences SET extra = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![serde_json::to_string(&extra)?, now, DEFAULT_USER_ID],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}
