//! CSV persistence for [`Table`]
//!
//! Files are written to a temp file next to the target and renamed into
//! place, so readers and crashed runs only ever see a complete file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::schema::TableKind;
use super::table::{FieldSet, RecordKey, Table, Value};
use crate::config::ensure_dir;
use crate::error::{GarminError, Result};

/// Loads and saves tables as comma-separated files with a header row
pub struct CsvStore;

impl CsvStore {
    /// Read a table; a missing file yields an empty table.
    ///
    /// Columns outside the schema are kept and written back on save. Schema
    /// columns absent from the file load as null.
    pub fn load(path: &Path, kind: TableKind) -> Result<Table> {
        let mut table = Table::new(kind);
        if !path.exists() {
            debug!(path = %path.display(), "No existing table, starting empty");
            return Ok(table);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| GarminError::database(format!("Failed to open {}: {}", path.display(), e)))?;

        let headers = reader
            .headers()
            .map_err(|e| GarminError::database(format!("Failed to read header of {}: {}", path.display(), e)))?
            .clone();
        if headers.iter().all(str::is_empty) {
            return Ok(table);
        }

        let key_column = kind.key_column();
        let key_index = headers.iter().position(|h| h == key_column).ok_or_else(|| {
            GarminError::database(format!("{} has no '{}' column", path.display(), key_column))
        })?;
        for header in headers.iter() {
            table.add_extra_column(header);
        }

        for record in reader.records() {
            let record = record
                .map_err(|e| GarminError::database(format!("Failed to read {}: {}", path.display(), e)))?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let cell = record.get(key_index).unwrap_or_default();
            if cell.trim().is_empty() {
                return Err(GarminError::database(format!(
                    "{} line {}: empty '{}'",
                    path.display(),
                    line,
                    key_column
                )));
            }
            let key = RecordKey::parse(kind, cell).map_err(|e| {
                GarminError::database(format!("{} line {}: {}", path.display(), line, e))
            })?;
            if table.contains(&key) {
                return Err(GarminError::database(format!(
                    "{} line {}: duplicate key {}",
                    path.display(),
                    line,
                    key
                )));
            }

            let mut fields = FieldSet::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                if header == key_column {
                    continue;
                }
                fields.set_opt(header, Value::from_cell(cell));
            }
            table.upsert(key, &fields)?;
        }

        debug!(path = %path.display(), rows = table.len(), "Loaded table");
        Ok(table)
    }

    /// Write the table atomically (temp file, fsync, rename)
    pub fn save(table: &Table, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        let temp_path = temp_path(path);
        let mut writer = csv::Writer::from_path(&temp_path)
            .map_err(|e| GarminError::database(format!("Failed to create temp file: {}", e)))?;

        let columns = table.columns();
        let key_column = table.kind().key_column();
        writer
            .write_record(&columns)
            .map_err(|e| GarminError::database(format!("Failed to write header: {}", e)))?;

        for (key, row) in table.rows() {
            let record = columns.iter().map(|column| {
                if column == key_column {
                    key.to_string()
                } else {
                    row.get(column).map(Value::to_string).unwrap_or_default()
                }
            });
            writer
                .write_record(record)
                .map_err(|e| GarminError::database(format!("Failed to write row {}: {}", key, e)))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| GarminError::database(format!("Failed to flush {}: {}", temp_path.display(), e.error())))?;
        file.sync_all()?;
        drop(file);

        // Atomic rename
        fs::rename(&temp_path, path)
            .map_err(|e| GarminError::database(format!("Failed to rename temp file: {}", e)))?;

        debug!(path = %path.display(), rows = table.len(), "Saved table");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
