//! SQLite side database kept next to the CSV tables
//!
//! This module handles the state that must not live in the data columns:
//! - unavailable_markers: categories the service confirmed it has no data for
//! - runs: one summary row per export run, shown by `status`

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::markers::Markers;
use super::schema::{Category, TableKind};
use super::table::RecordKey;
use crate::error::{GarminError, Result};

/// Persisted outcome counts of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `completed` or `aborted`
    pub status: String,
    pub listed: u32,
    pub created: u32,
    pub filled: u32,
    pub not_available: u32,
    pub skipped: u32,
    pub unchanged: u32,
}

/// SQLite database for markers and run history
pub struct SyncDb {
    conn: Connection,
}

impl SyncDb {
    /// Open or create the sync database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| GarminError::Database(format!("Failed to open sync database: {}", e)))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GarminError::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS unavailable_markers (
                    table_name TEXT NOT NULL,
                    record_key TEXT NOT NULL,
                    category TEXT NOT NULL,
                    checked_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (table_name, record_key, category)
                );

                CREATE TABLE IF NOT EXISTS runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    started_at TEXT NOT NULL,
                    finished_at TEXT NOT NULL,
                    status TEXT NOT NULL,
                    listed INTEGER NOT NULL DEFAULT 0,
                    created INTEGER NOT NULL DEFAULT 0,
                    filled INTEGER NOT NULL DEFAULT 0,
                    not_available INTEGER NOT NULL DEFAULT 0,
                    skipped INTEGER NOT NULL DEFAULT 0,
                    unchanged INTEGER NOT NULL DEFAULT 0
                );
                "#,
            )
            .map_err(|e| GarminError::Database(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    // =========================================================================
    // Unavailable markers
    // =========================================================================

    /// Load every marker recorded for a table
    pub fn load_markers(&self, kind: TableKind) -> Result<Markers> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT record_key, category FROM unavailable_markers
                 WHERE table_name = ?
                 ORDER BY record_key, category",
            )
            .map_err(|e| GarminError::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![kind.name()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| GarminError::Database(format!("Failed to load markers: {}", e)))?;

        let mut markers = Markers::new(kind);
        for row in rows {
            let (key, category) =
                row.map_err(|e| GarminError::Database(format!("Failed to read marker: {}", e)))?;
            let key = RecordKey::parse(kind, &key)?;
            let category: Category = category
                .parse()
                .map_err(|e| GarminError::Database(format!("Corrupt marker: {}", e)))?;
            markers.insert(key, category);
        }

        Ok(markers)
    }

    /// Persist markers; existing ones keep their original `checked_at`.
    /// Returns how many were new.
    pub fn save_markers(&self, markers: &Markers) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GarminError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO unavailable_markers (table_name, record_key, category)
                     VALUES (?, ?, ?)",
                )
                .map_err(|e| GarminError::Database(format!("Failed to prepare insert: {}", e)))?;

            for (key, category) in markers.iter() {
                inserted += stmt
                    .execute(params![markers.kind().name(), key.to_string(), category.name()])
                    .map_err(|e| GarminError::Database(format!("Failed to save marker: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| GarminError::Database(format!("Failed to commit markers: {}", e)))?;

        Ok(inserted)
    }

    // =========================================================================
    // Run history
    // =========================================================================

    /// Record a finished run
    pub fn record_run(&self, run: &RunRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO runs (started_at, finished_at, status, listed, created, filled,
                                   not_available, skipped, unchanged)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    run.started_at.to_rfc3339(),
                    run.finished_at.to_rfc3339(),
                    run.status,
                    run.listed,
                    run.created,
                    run.filled,
                    run.not_available,
                    run.skipped,
                    run.unchanged,
                ],
            )
            .map_err(|e| GarminError::Database(format!("Failed to record run: {}", e)))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent run, if any
    pub fn last_run(&self) -> Result<Option<RunRecord>> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, status, listed, created, filled,
                        not_available, skipped, unchanged
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: Some(row.get(0)?),
                        started_at: parse_timestamp(row.get::<_, String>(1)?),
                        finished_at: parse_timestamp(row.get::<_, String>(2)?),
                        status: row.get(3)?,
                        listed: row.get(4)?,
                        created: row.get(5)?,
                        filled: row.get(6)?,
                        not_available: row.get(7)?,
                        skipped: row.get(8)?,
                        unchanged: row.get(9)?,
                    })
                },
            )
            .optional()
            .map_err(|e| GarminError::Database(format!("Failed to get last run: {}", e)))
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
