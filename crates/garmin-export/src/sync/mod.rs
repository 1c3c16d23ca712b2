//! Incremental export of Garmin data into local tables
//!
//! Provides:
//! - Delta planning: only fetch what a table is missing
//! - Fill-nulls-only merging with checked-unavailable markers
//! - Bounded retries and request pacing
//! - GPS track downloads stored beside the tables
//! - Checkpointed, strictly sequential execution

pub mod merge;
pub mod planner;
pub mod rate_limiter;
pub mod retry;
pub mod tracks;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::{GarminError, Result};
use crate::fetch::{Fetched, RemoteSource};
use crate::models::DateRange;
use crate::storage::{Category, FetchState, FieldSet, Markers, RunRecord, Storage, Table, TableKind};

pub use merge::{merge_enrichment, merge_listing, ListingReport, MergeEffect};
pub use planner::{Coverage, FetchOp, Planner};
pub use rate_limiter::RateLimiter;
pub use retry::{with_retry, Outcome, RetryPolicy};
pub use tracks::TrackStore;

/// Log progress every this many enrichment operations
const PROGRESS_EVERY: usize = 10;

/// Options for an export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Tables to export, in order
    pub tables: Vec<TableKind>,
    pub coverage: Coverage,
}

impl ExportOptions {
    /// Both tables over the given coverage
    pub fn all(coverage: Coverage) -> Self {
        Self {
            tables: vec![TableKind::Activities, TableKind::Days],
            coverage,
        }
    }
}

/// An operation given up after retries
#[derive(Debug)]
pub struct SkippedOp {
    pub op: FetchOp,
    pub error: GarminError,
}

impl fmt::Display for SkippedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.op, self.error)
    }
}

/// Statistics from an export run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Records returned by listings
    pub listed: u32,
    /// Rows created from listings
    pub created: u32,
    /// Fetches that filled at least one field
    pub enriched: u32,
    /// Fields filled in total
    pub filled: u32,
    /// Categories marked as unavailable
    pub not_available: u32,
    /// Fetches that brought nothing new
    pub unchanged: u32,
    /// Track files written again at their recorded path
    pub restored: u32,
    pub skipped: Vec<SkippedOp>,
}

impl RunSummary {
    fn record(&mut self, op: &FetchOp, effect: MergeEffect) {
        match effect {
            MergeEffect::Filled(n) => {
                self.enriched += 1;
                self.filled += n as u32;
            }
            MergeEffect::MarkedUnavailable => self.not_available += 1,
            MergeEffect::Unchanged => self.unchanged += 1,
            MergeEffect::Restored => self.restored += 1,
            MergeEffect::Failed(error) => self.skip(op.clone(), error),
        }
    }

    fn skip(&mut self, op: FetchOp, error: GarminError) {
        warn!(op = %op, error = %error, "Skipped");
        self.skipped.push(SkippedOp { op, error });
    }

    /// Row for the `runs` history table
    pub fn to_record(&self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, status: &str) -> RunRecord {
        RunRecord {
            id: None,
            started_at,
            finished_at,
            status: status.to_string(),
            listed: self.listed,
            created: self.created,
            filled: self.filled,
            not_available: self.not_available,
            skipped: self.skipped.len() as u32,
            unchanged: self.unchanged,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Listed: {} ({} new), Enriched: {} ({} fields), Not available: {}, Unchanged: {}, Skipped: {}",
            self.listed,
            self.created,
            self.enriched,
            self.filled,
            self.not_available,
            self.unchanged,
            self.skipped.len()
        )?;
        if self.restored > 0 {
            write!(f, ", Restored: {}", self.restored)?;
        }
        Ok(())
    }
}

/// Per-category counts of one table, for `status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryStatus {
    pub present: usize,
    pub unavailable: usize,
    pub missing: usize,
}

/// Snapshot of a table's completeness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub kind: TableKind,
    pub rows: usize,
    pub categories: Vec<(Category, CategoryStatus)>,
}

impl TableStatus {
    /// Count fetch states over every row a category applies to
    pub fn collect(table: &Table, markers: &Markers) -> Self {
        let categories = table
            .kind()
            .categories()
            .iter()
            .map(|category| {
                let mut status = CategoryStatus::default();
                for (key, _) in table.rows() {
                    if !table.categories_for(key).contains(category) {
                        continue;
                    }
                    match table.fetch_state(key, *category, markers) {
                        FetchState::Present => status.present += 1,
                        FetchState::Unavailable => status.unavailable += 1,
                        FetchState::Missing => status.missing += 1,
                    }
                }
                (*category, status)
            })
            .collect();

        Self {
            kind: table.kind(),
            rows: table.len(),
            categories,
        }
    }
}

/// Runs planned fetches against a source and merges them into storage
pub struct Exporter<S> {
    source: S,
    storage: Storage,
    config: ExportConfig,
    today: NaiveDate,
}

impl<S: RemoteSource> Exporter<S> {
    pub fn new(source: S, storage: Storage, config: ExportConfig) -> Self {
        Self {
            source,
            storage,
            config,
            today: Local::now().date_naive(),
        }
    }

    /// Pin "today" (for testing)
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn resolve(&self, coverage: Coverage) -> Option<DateRange> {
        coverage.resolve(self.config.start_date, self.today)
    }

    /// First date whose absences are not yet trusted: devices upload with a
    /// delay, so yesterday and today are checked again on the next run
    fn syncing_from(&self) -> NaiveDate {
        self.today.pred_opt().unwrap_or(self.today)
    }

    fn tracks(&self) -> TrackStore {
        let base_dir = self
            .storage
            .table_path(TableKind::Activities)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        TrackStore::new(&self.config.tracks_dir, base_dir).with_syncing_from(self.syncing_from())
    }

    /// Predicted operations without contacting the service
    pub fn plan(&self, options: &ExportOptions) -> Result<Vec<FetchOp>> {
        let Some(range) = self.resolve(options.coverage) else {
            return Ok(Vec::new());
        };
        let tracks = self.tracks();

        let mut ops = Vec::new();
        for kind in &options.tables {
            let (table, markers) = self.storage.load(*kind)?;
            ops.extend(Planner::new(*kind, range).plan(&table, &markers, |row| tracks.exists(row)));
        }
        Ok(ops)
    }

    /// Export the selected tables.
    ///
    /// Authentication happens before any fetch and its failure aborts the
    /// run. Other failures are retried, then skipped and reported in the
    /// summary. A fatal error mid-run saves what was merged, then aborts.
    pub async fn run(&mut self, options: &ExportOptions) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut summary = RunSummary::default();

        let Some(range) = self.resolve(options.coverage) else {
            info!("Requested range lies entirely in the future, nothing to export");
            return Ok(summary);
        };

        self.source.authenticate().await?;

        let mut result = Ok(());
        for kind in &options.tables {
            if let Err(e) = self.export_table(*kind, range, &mut summary).await {
                result = Err(e);
                break;
            }
        }

        let status = if result.is_ok() { "completed" } else { "aborted" };
        let record = summary.to_record(started_at, Utc::now(), status);
        if let Err(e) = self.storage.sync_db.record_run(&record) {
            warn!(error = %e, "Could not record run history");
        }

        result.map(|_| summary)
    }

    async fn export_table(&self, kind: TableKind, range: DateRange, summary: &mut RunSummary) -> Result<()> {
        let (mut table, mut markers) = self.storage.load(kind)?;
        let planner = Planner::new(kind, range);
        info!(table = %kind, %range, rows = table.len(), "Exporting");

        if planner.listing_op(&table).is_some() {
            let listed = self.list(kind, range, &mut table, summary).await;
            self.storage.checkpoint(&table, &markers)?;
            listed?;
        }

        let tracks = self.tracks();
        let ops = planner.enrichment_ops(&table, &markers, |row| tracks.exists(row));
        info!(table = %kind, operations = ops.len(), "Planned enrichment");

        let enriched = self
            .enrich(&ops, &tracks, &mut table, &mut markers, summary)
            .await;
        self.storage.checkpoint(&table, &markers)?;
        enriched
    }

    async fn list(
        &self,
        kind: TableKind,
        range: DateRange,
        table: &mut Table,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let op = FetchOp::Listing { kind, range };
        let what = op.to_string();
        let policy = &self.config.retry;
        let source = &self.source;
        let mut cursor = 0;

        loop {
            let outcome = match kind {
                TableKind::Activities => {
                    with_retry(policy, &what, move || async move {
                        source.list_activities(range, cursor).await.map(Fetched::Data)
                    })
                    .await?
                }
                TableKind::Days => {
                    with_retry(policy, &what, move || async move {
                        source.list_days(range).await.map(Fetched::Data)
                    })
                    .await?
                }
            };

            match outcome {
                Outcome::Done(page) => {
                    let report = merge_listing(table, &page.records)?;
                    summary.listed += report.listed as u32;
                    summary.created += report.created as u32;
                    debug!(table = %kind, cursor, listed = report.listed, created = report.created, "Listing page merged");

                    match page.next {
                        Some(next) if next > cursor => cursor = next,
                        _ => break,
                    }
                }
                Outcome::NotAvailable => break,
                Outcome::Skipped(error) => {
                    summary.skip(op, error);
                    break;
                }
            }
        }

        info!(table = %kind, rows = table.len(), "Listing complete");
        Ok(())
    }

    async fn enrich(
        &self,
        ops: &[FetchOp],
        tracks: &TrackStore,
        table: &mut Table,
        markers: &mut Markers,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let kind = table.kind();
        let mut cache: HashMap<(NaiveDate, Category), Fetched<FieldSet>> = HashMap::new();
        let mut since_checkpoint = 0;
        let mut downloading_tracks = false;

        for (index, op) in ops.iter().enumerate() {
            let effect = match op {
                FetchOp::Enrichment {
                    key,
                    date,
                    category,
                } => {
                    let outcome = self.fetch_enrichment(&mut cache, op, *date, *category).await?;
                    if matches!(outcome, Outcome::NotAvailable) && *date >= self.syncing_from() {
                        debug!(op = %op, "No data yet, checking again next run");
                        MergeEffect::Unchanged
                    } else {
                        merge_enrichment(table, markers, key, *category, outcome)?
                    }
                }
                FetchOp::Auxiliary { key, .. } => {
                    if !downloading_tracks {
                        // End of the field enrichment phase
                        downloading_tracks = true;
                        self.storage.checkpoint(table, markers)?;
                        since_checkpoint = 0;
                        info!(table = %kind, "Downloading tracks");
                    }
                    tracks
                        .ensure(table, markers, &self.source, &self.config.retry, key)
                        .await?
                }
                FetchOp::Listing { .. } => continue,
            };
            debug!(op = %op, ?effect, "Merged");
            summary.record(op, effect);

            since_checkpoint += 1;
            if since_checkpoint >= self.config.checkpoint_every {
                self.storage.checkpoint(table, markers)?;
                since_checkpoint = 0;
            }
            if (index + 1) % PROGRESS_EVERY == 0 {
                info!(table = %kind, "{}/{} operations", index + 1, ops.len());
            }
        }

        Ok(())
    }

    /// Fetch one (date, category) at most once per run; several activities
    /// on the same date share the result
    async fn fetch_enrichment(
        &self,
        cache: &mut HashMap<(NaiveDate, Category), Fetched<FieldSet>>,
        op: &FetchOp,
        date: NaiveDate,
        category: Category,
    ) -> Result<Outcome<FieldSet>> {
        if let Some(hit) = cache.get(&(date, category)) {
            return Ok(match hit {
                Fetched::Data(fields) => Outcome::Done(fields.clone()),
                Fetched::NotAvailable => Outcome::NotAvailable,
            });
        }

        let source = &self.source;
        let outcome = with_retry(&self.config.retry, &op.to_string(), move || {
            source.fetch_enrichment(date, category)
        })
        .await?;

        match &outcome {
            Outcome::Done(fields) => {
                cache.insert((date, category), Fetched::Data(fields.clone()));
            }
            Outcome::NotAvailable => {
                cache.insert((date, category), Fetched::NotAvailable);
            }
            Outcome::Skipped(_) => {}
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date;
    use crate::storage::{RecordKey, Value};

    #[test]
    fn test_summary_display() {
        let mut summary = RunSummary {
            listed: 4,
            created: 2,
            ..Default::default()
        };
        let op = FetchOp::Enrichment {
            key: RecordKey::Day(parse_date("2024-01-02").unwrap()),
            date: parse_date("2024-01-02").unwrap(),
            category: Category::Health,
        };
        summary.record(&op, MergeEffect::Filled(3));
        summary.record(&op, MergeEffect::MarkedUnavailable);
        summary.record(&op, MergeEffect::Failed(GarminError::RateLimited));

        assert_eq!(
            summary.to_string(),
            "Listed: 4 (2 new), Enriched: 1 (3 fields), Not available: 1, Unchanged: 0, Skipped: 1"
        );
        assert_eq!(
            summary.skipped[0].to_string(),
            "health 2024-01-02: Rate limited. Please wait before retrying."
        );

        let record = summary.to_record(Utc::now(), Utc::now(), "completed");
        assert_eq!(record.skipped, 1);
        assert_eq!(record.filled, 3);
    }

    #[test]
    fn test_table_status_counts() {
        let mut table = Table::new(TableKind::Activities);
        let mut markers = Markers::new(TableKind::Activities);

        let mut gps = FieldSet::new();
        gps.set("hasPolyline", true);
        gps.set("trainingReadinessScore", 55_i64);
        table.insert_core(RecordKey::Activity(1), &gps).unwrap();

        let mut indoor = FieldSet::new();
        indoor.set("hasPolyline", Value::Bool(false));
        table.insert_core(RecordKey::Activity(2), &indoor).unwrap();
        markers.insert(RecordKey::Activity(2), Category::TrainingReadiness);

        let status = TableStatus::collect(&table, &markers);
        assert_eq!(status.rows, 2);
        let readiness = &status.categories[1];
        assert_eq!(readiness.0, Category::TrainingReadiness);
        assert_eq!(
            readiness.1,
            CategoryStatus {
                present: 1,
                unavailable: 1,
                missing: 0
            }
        );
        let track = &status.categories[2];
        assert_eq!(track.1.missing, 1);
        assert_eq!(track.1.present + track.1.unavailable, 0);
    }
}
