//! SQLite-backed token persistence.

use super::TokenStore;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Key under which the orchestrator token is stored.
const TOKEN_KEY: &str = "airflow_token";

/// Token storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE token_store (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL,
///     updated_at TEXT NOT NULL  -- ISO 8601 timestamp
/// );
/// ```
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    /// Creates or opens a token store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file
    ///
    /// # Returns
    /// * `Ok(SqliteTokenStore)` - Initialized store
    /// * `Err` - If database creation fails
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open token database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS token_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create token_store table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT value FROM token_store WHERE key = ?1")
            .context("Failed to prepare query")?;

        let mut rows = stmt
            .query(params![TOKEN_KEY])
            .context("Failed to execute query")?;

        if let Some(row) = rows.next().context("Failed to read row")? {
            let value: String = row.get(0)?;
            // An empty value reads the same as a missing row
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value))
            }
        } else {
            Ok(None)
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO token_store (key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![TOKEN_KEY, token, now],
            )
            .context("Failed to store token")?;

        Ok(())
    }
}
