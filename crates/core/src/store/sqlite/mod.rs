//! SQLite-backed work-item store.

mod channels;
mod keywords;
mod topic_searches;
mod uploads;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use super::StoreError;

/// SQLite-backed store implementing every store trait.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS keywords (
                id TEXT PRIMARY KEY,
                keyword TEXT NOT NULL,
                topic TEXT NOT NULL,
                second_topic TEXT,
                competition REAL NOT NULL DEFAULT 0,
                volume REAL NOT NULL DEFAULT 0,
                overall REAL NOT NULL DEFAULT 0,
                estimated_monthly_search REAL NOT NULL DEFAULT 0,
                priority REAL NOT NULL DEFAULT 0,
                script_state TEXT NOT NULL,
                short_state TEXT NOT NULL,
                long_state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_keywords_keyword ON keywords(keyword);
            CREATE INDEX IF NOT EXISTS idx_keywords_priority ON keywords(priority DESC);
            CREATE INDEX IF NOT EXISTS idx_keywords_updated_at ON keywords(updated_at);

            CREATE TABLE IF NOT EXISTS channels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                topics TEXT NOT NULL,
                max_daily_short_videos_limit INTEGER NOT NULL,
                max_daily_long_videos_limit INTEGER NOT NULL,
                chrome_profile_id TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_uploading_video INTEGER NOT NULL DEFAULT 1,
                is_running_search_keyword INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS uploads (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL REFERENCES channels(id),
                keyword_id TEXT NOT NULL,
                video_type TEXT NOT NULL,
                visibility TEXT NOT NULL,
                publish_at TEXT NOT NULL,
                youtube_link TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_uploads_assignment
                ON uploads(channel_id, keyword_id, video_type);
            CREATE INDEX IF NOT EXISTS idx_uploads_quota
                ON uploads(channel_id, video_type, created_at);
            CREATE INDEX IF NOT EXISTS idx_uploads_due ON uploads(visibility, publish_at);

            CREATE TABLE IF NOT EXISTS topic_searches (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                related_topic TEXT NOT NULL,
                is_handled INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_topic_searches_pair
                ON topic_searches(topic, related_topic);
            "#,
        )?;

        Ok(())
    }

    /// Run raw SQL against the connection (test setup only).
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), StoreError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }
}

/// Fixed-width RFC 3339 so that stored timestamps compare lexicographically.
pub(crate) fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    value: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `?, ?, ?` for `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
