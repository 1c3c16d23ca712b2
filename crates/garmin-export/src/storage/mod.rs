//! Storage layer for exported Garmin data
//!
//! Tables are plain CSV files so the dashboard (or a spreadsheet) can read
//! them directly. Operational state lives in a small SQLite file beside them.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/garmin/export/
//! ├── garmin_stats.csv             # One row per activity
//! ├── garmin_daily_health.csv      # One row per calendar date
//! ├── gps_tracks/
//! │   ├── 12345678901.gpx          # One file per activity with GPS
//! │   └── ...
//! └── sync.db                      # Unavailable markers + run history
//! ```
//!
//! ## Concurrent Access
//!
//! CSV files are written atomically (temp file + rename), so readers always
//! see either the previous or the new complete table.

mod csv_store;
mod markers;
mod schema;
mod sync_db;
mod table;

pub use csv_store::CsvStore;
pub use markers::Markers;
pub use schema::{Category, Completeness, TableKind, HAS_POLYLINE, START_TIME_LOCAL, TRACK_FILE};
pub use sync_db::{RunRecord, SyncDb};
pub use table::{FetchState, FieldSet, RecordKey, Row, Table, UpsertReport, Value};

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ensure_dir, ExportConfig};
use crate::error::Result;

/// Table files plus the sync database of one export directory
pub struct Storage {
    activities_file: PathBuf,
    daily_file: PathBuf,
    pub sync_db: SyncDb,
}

impl Storage {
    /// Open storage for the configured paths, creating the data directory
    pub fn open(config: &ExportConfig) -> Result<Self> {
        ensure_dir(&config.data_dir)?;
        let sync_db = SyncDb::open(config.sync_db_path())?;
        Ok(Self {
            activities_file: config.activities_file.clone(),
            daily_file: config.daily_file.clone(),
            sync_db,
        })
    }

    /// Storage whose sync database lives in memory (for testing)
    pub fn open_in_memory(config: &ExportConfig) -> Result<Self> {
        ensure_dir(&config.data_dir)?;
        Ok(Self {
            activities_file: config.activities_file.clone(),
            daily_file: config.daily_file.clone(),
            sync_db: SyncDb::open_in_memory()?,
        })
    }

    pub fn table_path(&self, kind: TableKind) -> &Path {
        match kind {
            TableKind::Activities => &self.activities_file,
            TableKind::Days => &self.daily_file,
        }
    }

    /// Load a table together with its markers
    pub fn load(&self, kind: TableKind) -> Result<(Table, Markers)> {
        let table = CsvStore::load(self.table_path(kind), kind)?;
        let markers = self.sync_db.load_markers(kind)?;
        Ok((table, markers))
    }

    /// Persist a table and its markers
    pub fn checkpoint(&self, table: &Table, markers: &Markers) -> Result<()> {
        CsvStore::save(table, self.table_path(table.kind()))?;
        let new_markers = self.sync_db.save_markers(markers)?;
        debug!(table = %table.kind(), rows = table.len(), new_markers, "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_open_creates_dir_and_db() {
        let temp = TempDir::new().unwrap();
        let config = ExportConfig::with_data_dir(temp.path().join("export"));
        let storage = Storage::open(&config).unwrap();
        assert!(config.data_dir.exists());
        assert!(config.sync_db_path().exists());
        assert_eq!(storage.table_path(TableKind::Days), config.daily_file.as_path());
    }

    #[test]
    fn test_checkpoint_then_load() {
        let temp = TempDir::new().unwrap();
        let config = ExportConfig::with_data_dir(temp.path());
        let storage = Storage::open(&config).unwrap();

        let mut table = Table::new(TableKind::Activities);
        let mut markers = Markers::new(TableKind::Activities);
        let mut core = FieldSet::new();
        core.set("activityName", "Lunch Swim");
        table.insert_core(RecordKey::Activity(3), &core).unwrap();
        markers.insert(RecordKey::Activity(3), Category::TrainingReadiness);

        storage.checkpoint(&table, &markers).unwrap();

        let (loaded, loaded_markers) = storage.load(TableKind::Activities).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded_markers.contains(&RecordKey::Activity(3), Category::TrainingReadiness));
    }
}
