//! Export commands for garmin-export

use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::cli::load_config;
use crate::config::{ConfigOverrides, CredentialStore, ExportConfig};
use crate::error::Result;
use crate::fetch::GarminSource;
use crate::models::{parse_date, DateRange};
use crate::storage::{Storage, TableKind};
use crate::sync::{Coverage, ExportOptions, Exporter, RateLimiter};

/// Run an export
pub async fn run(
    profile: Option<String>,
    data_dir: Option<PathBuf>,
    activities: bool,
    days: bool,
    from: Option<String>,
    to: Option<String>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        println!("Dry run mode - nothing will be fetched or written");
        return plan(profile, data_dir, activities, days, from, to).await;
    }

    let (config, options) = prepare(data_dir, activities, days, from, to)?;
    println!("Exporting to: {}", config.data_dir.display());

    let mut exporter = exporter(profile, config)?;
    println!("Starting export...");
    let summary = exporter.run(&options).await?;

    println!("\nExport complete: {}", summary);
    for skipped in &summary.skipped {
        println!("  skipped {}", skipped);
    }
    Ok(())
}

/// Print the operations an export would perform
pub async fn plan(
    profile: Option<String>,
    data_dir: Option<PathBuf>,
    activities: bool,
    days: bool,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let (config, options) = prepare(data_dir, activities, days, from, to)?;
    println!("Export directory: {}", config.data_dir.display());

    let ops = exporter(profile, config)?.plan(&options)?;
    if ops.is_empty() {
        println!("Everything is up to date.");
        return Ok(());
    }

    for op in &ops {
        println!("  {}", op);
    }
    println!("\n{} operations planned", ops.len());
    Ok(())
}

fn prepare(
    data_dir: Option<PathBuf>,
    activities: bool,
    days: bool,
    from: Option<String>,
    to: Option<String>,
) -> Result<(ExportConfig, ExportOptions)> {
    let from = from.as_deref().map(parse_date).transpose()?;
    let to = to.as_deref().map(parse_date).transpose()?;

    let config = load_config(ConfigOverrides {
        data_dir,
        start_date: from,
    })?;
    let options = ExportOptions {
        tables: selected_tables(activities, days),
        coverage: coverage(config.start_date, to, Local::now().date_naive())?,
    };
    Ok((config, options))
}

fn exporter(profile: Option<String>, config: ExportConfig) -> Result<Exporter<GarminSource>> {
    let credentials = CredentialStore::new(profile)?;
    let storage = Storage::open(&config)?;
    let source = GarminSource::new(credentials, RateLimiter::new(config.min_request_delay))
        .with_retry_policy(config.retry.clone());
    Ok(Exporter::new(source, storage, config))
}

/// Neither flag selects both tables
fn selected_tables(activities: bool, days: bool) -> Vec<TableKind> {
    let all = !activities && !days;
    let mut tables = Vec::new();
    if activities || all {
        tables.push(TableKind::Activities);
    }
    if days || all {
        tables.push(TableKind::Days);
    }
    tables
}

/// Without an end date the export runs through today
fn coverage(start: NaiveDate, to: Option<NaiveDate>, today: NaiveDate) -> Result<Coverage> {
    match to {
        Some(end) if end < today => Ok(Coverage::Range(DateRange::new(start, end)?)),
        _ if start > today => Ok(Coverage::Range(DateRange::day(start))),
        _ => Ok(Coverage::All),
    }
}
