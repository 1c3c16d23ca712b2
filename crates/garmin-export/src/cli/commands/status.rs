//! Status command for garmin-export

use std::path::PathBuf;

use crate::cli::load_config;
use crate::config::ConfigOverrides;
use crate::error::Result;
use crate::storage::{Storage, TableKind};
use crate::sync::TableStatus;

/// Show table completeness and the last run
pub async fn status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(ConfigOverrides {
        data_dir,
        start_date: None,
    })?;

    if !config.activities_file.exists() && !config.daily_file.exists() {
        println!("No export found in: {}", config.data_dir.display());
        println!("Run 'garmin-export run' to create one.");
        return Ok(());
    }

    let storage = Storage::open(&config)?;
    println!("Export directory: {}", config.data_dir.display());

    for kind in [TableKind::Activities, TableKind::Days] {
        let (table, markers) = storage.load(kind)?;
        let status = TableStatus::collect(&table, &markers);

        println!();
        println!(
            "{} ({}): {} rows",
            kind,
            storage.table_path(kind).display(),
            status.rows
        );
        for (category, counts) in &status.categories {
            println!(
                "  {:<20} present {:>6}  unavailable {:>6}  missing {:>6}",
                category.name(),
                counts.present,
                counts.unavailable,
                counts.missing
            );
        }
    }

    println!();
    match storage.sync_db.last_run()? {
        Some(run) => {
            println!(
                "Last run: {} ({}), finished {}",
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.status,
                run.finished_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "  Listed: {} ({} new), Filled: {}, Not available: {}, Unchanged: {}, Skipped: {}",
                run.listed, run.created, run.filled, run.not_available, run.unchanged, run.skipped
            );
        }
        None => println!("No runs recorded yet"),
    }

    Ok(())
}
