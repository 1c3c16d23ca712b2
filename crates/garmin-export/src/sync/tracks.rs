//! GPS track files stored beside the activities table

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::merge::MergeEffect;
use super::retry::{with_retry, Outcome, RetryPolicy};
use crate::error::{GarminError, Result};
use crate::fetch::RemoteSource;
use crate::storage::{Category, FieldSet, Markers, RecordKey, Row, Table, TRACK_FILE};

/// Manages `<tracks_dir>/<activityId>.<gpx|tcx>` files.
///
/// Paths are recorded relative to `base_dir`, the directory of the
/// activities table, so the export directory can be moved as a whole.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks_dir: PathBuf,
    base_dir: PathBuf,
    syncing_from: Option<NaiveDate>,
}

impl TrackStore {
    pub fn new(tracks_dir: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracks_dir: tracks_dir.into(),
            base_dir: base_dir.into(),
            syncing_from: None,
        }
    }

    /// Missing tracks of activities on or after `date` are left unmarked,
    /// the device may not have uploaded them yet
    pub fn with_syncing_from(mut self, date: NaiveDate) -> Self {
        self.syncing_from = Some(date);
        self
    }

    fn may_still_sync(&self, date: Option<NaiveDate>) -> bool {
        matches!((self.syncing_from, date), (Some(from), Some(date)) if date >= from)
    }

    /// Absolute location of a recorded path
    pub fn resolve(&self, recorded: &str) -> PathBuf {
        let path = Path::new(recorded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Whether the row's recorded track file is on disk
    pub fn exists(&self, row: &Row) -> bool {
        row.get(TRACK_FILE)
            .map(|v| self.resolve(&v.to_string()).is_file())
            .unwrap_or(false)
    }

    fn record_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Write bytes under a `.part` name and rename into place, so an
    /// interrupted download never leaves a file that looks complete
    async fn write(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut part_name = target.file_name().unwrap_or_default().to_os_string();
        part_name.push(".part");
        let part = target.with_file_name(part_name);

        tokio::fs::write(&part, bytes).await?;
        tokio::fs::rename(&part, target).await?;
        Ok(())
    }

    /// Make sure the activity's track is on disk and recorded in the row.
    ///
    /// A recorded path whose file vanished is written again at that path;
    /// the row itself is not modified in that case.
    pub async fn ensure<S: RemoteSource>(
        &self,
        table: &mut Table,
        markers: &mut Markers,
        source: &S,
        policy: &RetryPolicy,
        key: &RecordKey,
    ) -> Result<MergeEffect> {
        let RecordKey::Activity(activity_id) = *key else {
            return Err(GarminError::invalid_param(format!("{} is not an activity", key)));
        };

        let recorded = table
            .lookup(key)
            .ok_or_else(|| GarminError::database(format!("No activities row for {}", key)))?
            .get(TRACK_FILE)
            .map(|v| v.to_string());
        if let Some(path) = &recorded {
            if self.resolve(path).is_file() {
                return Ok(MergeEffect::Unchanged);
            }
        }

        let what = format!("track {}", key);
        let outcome = with_retry(policy, &what, move || source.fetch_auxiliary(activity_id)).await?;

        match outcome {
            Outcome::Done(track) => {
                let target = match &recorded {
                    Some(path) => self.resolve(path),
                    None => self.tracks_dir.join(track.file_name(activity_id)),
                };
                if let Err(e) = self.write(&target, &track.bytes).await {
                    warn!(activity_id, path = %target.display(), error = %e, "Could not write track");
                    return Ok(MergeEffect::Failed(e));
                }
                debug!(activity_id, path = %target.display(), bytes = track.bytes.len(), "Track written");

                if recorded.is_some() {
                    return Ok(MergeEffect::Restored);
                }
                let mut fields = FieldSet::new();
                fields.set(TRACK_FILE, self.record_path(&target));
                let report = table.upsert(key.clone(), &fields)?;
                Ok(MergeEffect::Filled(report.filled))
            }
            Outcome::NotAvailable if self.may_still_sync(table.record_date(key)) => {
                debug!(activity_id, "No track yet, checking again next run");
                Ok(MergeEffect::Unchanged)
            }
            Outcome::NotAvailable => {
                markers.insert(key.clone(), Category::Track);
                Ok(MergeEffect::MarkedUnavailable)
            }
            Outcome::Skipped(e) => Ok(MergeEffect::Failed(e)),
        }
    }
}
