//! Applying fetch results to a table

use crate::error::{GarminError, Result};
use crate::fetch::Listed;
use crate::storage::{Category, FieldSet, Markers, RecordKey, Table};

use super::retry::Outcome;

/// Counts from merging one listing page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingReport {
    pub listed: usize,
    pub created: usize,
}

/// What merging one enrichment result did to the table
#[derive(Debug)]
pub enum MergeEffect {
    /// This many null fields received values
    Filled(usize),
    /// Recorded as checked-unavailable; fields stay null
    MarkedUnavailable,
    /// Result carried nothing new
    Unchanged,
    /// A recorded track file was missing and has been written again
    Restored,
    /// The fetch was given up; the category stays missing
    Failed(GarminError),
}

/// Create rows for listed keys the table does not hold yet.
/// Existing rows are left as they are.
pub fn merge_listing(table: &mut Table, records: &[Listed]) -> Result<ListingReport> {
    let mut report = ListingReport::default();
    for record in records {
        report.listed += 1;
        if table.insert_core(record.key.clone(), &record.core)? {
            report.created += 1;
        }
    }
    Ok(report)
}

/// Merge an enrichment outcome for one key.
///
/// Only fields of `category` are taken from the result, and only into null
/// cells. A confirmed absence becomes a marker, never a sentinel value.
pub fn merge_enrichment(
    table: &mut Table,
    markers: &mut Markers,
    key: &RecordKey,
    category: Category,
    outcome: Outcome<FieldSet>,
) -> Result<MergeEffect> {
    if !table.contains(key) {
        return Err(GarminError::database(format!(
            "No {} row for {}",
            table.kind(),
            key
        )));
    }

    match outcome {
        Outcome::Done(fields) => {
            let report = table.upsert(key.clone(), &fields.only(category.fields()))?;
            Ok(if report.filled > 0 {
                MergeEffect::Filled(report.filled)
            } else {
                MergeEffect::Unchanged
            })
        }
        Outcome::NotAvailable => {
            markers.insert(key.clone(), category);
            Ok(MergeEffect::MarkedUnavailable)
        }
        Outcome::Skipped(e) => Ok(MergeEffect::Failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date;
    use crate::storage::{FetchState, TableKind, Value};

    fn day(s: &str) -> RecordKey {
        RecordKey::Day(parse_date(s).unwrap())
    }

    fn listed(key: RecordKey) -> Listed {
        Listed {
            key,
            core: FieldSet::new(),
        }
    }

    #[test]
    fn test_listing_creates_only_new_rows() {
        let mut table = Table::new(TableKind::Days);
        let first = merge_listing(&mut table, &[listed(day("2024-01-01"))]).unwrap();
        assert_eq!(first, ListingReport { listed: 1, created: 1 });

        let second = merge_listing(
            &mut table,
            &[listed(day("2024-01-01")), listed(day("2024-01-02"))],
        )
        .unwrap();
        assert_eq!(second, ListingReport { listed: 2, created: 1 });
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_done_fills_and_ignores_foreign_fields() {
        let mut table = Table::new(TableKind::Days);
        let mut markers = Markers::new(TableKind::Days);
        let key = day("2024-01-01");
        merge_listing(&mut table, &[listed(key.clone())]).unwrap();

        let mut fields = FieldSet::new();
        fields.set("trainingReadinessScore", 71_i64);
        fields.set("sleepDuration", 9.0);
        let effect = merge_enrichment(
            &mut table,
            &mut markers,
            &key,
            Category::TrainingReadiness,
            Outcome::Done(fields.clone()),
        )
        .unwrap();
        assert!(matches!(effect, MergeEffect::Filled(1)));
        assert!(table.lookup(&key).unwrap().is_null("sleepDuration"));

        let again = merge_enrichment(
            &mut table,
            &mut markers,
            &key,
            Category::TrainingReadiness,
            Outcome::Done(fields),
        )
        .unwrap();
        assert!(matches!(again, MergeEffect::Unchanged));
        assert_eq!(
            table.lookup(&key).unwrap().get("trainingReadinessScore"),
            Some(&Value::Int(71))
        );
    }

    #[test]
    fn test_not_available_marks_without_touching_fields() {
        let mut table = Table::new(TableKind::Days);
        let mut markers = Markers::new(TableKind::Days);
        let key = day("2024-01-01");
        merge_listing(&mut table, &[listed(key.clone())]).unwrap();

        let effect = merge_enrichment(
            &mut table,
            &mut markers,
            &key,
            Category::TrainingReadiness,
            Outcome::NotAvailable,
        )
        .unwrap();
        assert!(matches!(effect, MergeEffect::MarkedUnavailable));
        assert_eq!(
            table.fetch_state(&key, Category::TrainingReadiness, &markers),
            FetchState::Unavailable
        );
        assert!(table.lookup(&key).unwrap().is_null("trainingReadinessScore"));
    }

    #[test]
    fn test_failure_leaves_category_missing() {
        let mut table = Table::new(TableKind::Days);
        let mut markers = Markers::new(TableKind::Days);
        let key = day("2024-01-01");
        merge_listing(&mut table, &[listed(key.clone())]).unwrap();

        let effect = merge_enrichment(
            &mut table,
            &mut markers,
            &key,
            Category::Health,
            Outcome::Skipped(GarminError::RateLimited),
        )
        .unwrap();
        assert!(matches!(effect, MergeEffect::Failed(GarminError::RateLimited)));
        assert_eq!(
            table.fetch_state(&key, Category::Health, &markers),
            FetchState::Missing
        );
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let mut table = Table::new(TableKind::Days);
        let mut markers = Markers::new(TableKind::Days);
        assert!(merge_enrichment(
            &mut table,
            &mut markers,
            &day("2024-01-01"),
            Category::Health,
            Outcome::NotAvailable,
        )
        .is_err());
    }
}
