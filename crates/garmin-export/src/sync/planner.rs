//! Delta planning: which fetches a table still needs for a date range

use std::fmt;

use chrono::NaiveDate;

use crate::models::DateRange;
use crate::storage::{Category, FetchState, Markers, RecordKey, Row, Table, TableKind};

/// Dates an export should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Range(DateRange),
    /// From the configured start date through today
    All,
}

impl Coverage {
    /// Concrete range, with the end clamped to `today`.
    /// `None` when the whole range lies in the future.
    pub fn resolve(&self, start_date: NaiveDate, today: NaiveDate) -> Option<DateRange> {
        match self {
            Coverage::Range(range) => range.clamp_end(today),
            Coverage::All => DateRange::new(start_date, today).ok(),
        }
    }
}

/// A single remote fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOp {
    Listing {
        kind: TableKind,
        range: DateRange,
    },
    Enrichment {
        key: RecordKey,
        date: NaiveDate,
        category: Category,
    },
    Auxiliary {
        key: RecordKey,
        activity_id: i64,
    },
}

impl fmt::Display for FetchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOp::Listing { kind, range } => write!(f, "list {} {}", kind, range),
            FetchOp::Enrichment {
                key,
                date,
                category,
            } => match key {
                RecordKey::Day(_) => write!(f, "{} {}", category, key),
                RecordKey::Activity(_) => write!(f, "{} {} ({})", category, key, date),
            },
            FetchOp::Auxiliary { key, .. } => write!(f, "track {}", key),
        }
    }
}

/// Plans fetches for one table over one date range
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    kind: TableKind,
    range: DateRange,
}

impl Planner {
    pub fn new(kind: TableKind, range: DateRange) -> Self {
        Self { kind, range }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Calendar dates of the range absent from a day table
    pub fn missing_days(&self, table: &Table) -> Vec<NaiveDate> {
        self.range
            .days()
            .filter(|date| !table.contains(&RecordKey::Day(*date)))
            .collect()
    }

    /// The listing fetch, if the range may hold keys the table lacks.
    ///
    /// Activities are always listed since only the service knows which exist.
    /// Days are listed only when a date of the range is missing.
    pub fn listing_op(&self, table: &Table) -> Option<FetchOp> {
        let gap = match self.kind {
            TableKind::Activities => true,
            TableKind::Days => !self.missing_days(table).is_empty(),
        };
        gap.then_some(FetchOp::Listing {
            kind: self.kind,
            range: self.range,
        })
    }

    /// Enrichment fetches for rows already in the table, ascending by key,
    /// auxiliary fetches last.
    ///
    /// `track_exists` tells whether a row's recorded track file is on disk;
    /// a recorded path whose file is gone is fetched again.
    pub fn enrichment_ops<F>(&self, table: &Table, markers: &Markers, track_exists: F) -> Vec<FetchOp>
    where
        F: Fn(&Row) -> bool,
    {
        let keys = table.keys_in(&self.range);
        let mut ops = Vec::new();
        let mut auxiliary = Vec::new();

        for key in keys {
            let Some(date) = table.record_date(&key) else {
                continue;
            };
            for category in table.categories_for(&key) {
                let state = table.fetch_state(&key, category, markers);
                if category.is_auxiliary() {
                    if let RecordKey::Activity(activity_id) = key {
                        let restore = state == FetchState::Present
                            && !markers.contains(&key, category)
                            && table.lookup(&key).is_some_and(|row| !track_exists(row));
                        if state == FetchState::Missing || restore {
                            auxiliary.push(FetchOp::Auxiliary {
                                key: key.clone(),
                                activity_id,
                            });
                        }
                    }
                } else if state == FetchState::Missing {
                    ops.push(FetchOp::Enrichment {
                        key: key.clone(),
                        date,
                        category,
                    });
                }
            }
        }

        ops.extend(auxiliary);
        ops
    }

    /// Full predicted plan without touching the network.
    ///
    /// Day rows the listing would create are included; activities the
    /// listing might return are not knowable in advance.
    pub fn plan<F>(&self, table: &Table, markers: &Markers, track_exists: F) -> Vec<FetchOp>
    where
        F: Fn(&Row) -> bool,
    {
        let mut plan: Vec<FetchOp> = self.listing_op(table).into_iter().collect();

        let mut enrichment = self.enrichment_ops(table, markers, track_exists);
        let split = enrichment
            .iter()
            .position(|op| matches!(op, FetchOp::Auxiliary { .. }))
            .unwrap_or(enrichment.len());
        let auxiliary = enrichment.split_off(split);

        if self.kind == TableKind::Days {
            for date in self.missing_days(table) {
                for category in self.kind.categories() {
                    enrichment.push(FetchOp::Enrichment {
                        key: RecordKey::Day(date),
                        date,
                        category: *category,
                    });
                }
            }
            enrichment.sort_by(|a, b| op_order(a).cmp(&op_order(b)));
        }

        plan.extend(enrichment);
        plan.extend(auxiliary);
        plan
    }
}

fn op_order(op: &FetchOp) -> (Option<&RecordKey>, Option<Category>) {
    match op {
        FetchOp::Enrichment { key, category, .. } => (Some(key), Some(*category)),
        FetchOp::Auxiliary { key, .. } => (Some(key), Some(Category::Track)),
        FetchOp::Listing { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date;
    use crate::storage::{FieldSet, Value, TRACK_FILE};

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn range(from: &str, to: &str) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    fn health_fields() -> FieldSet {
        let mut fields = FieldSet::new();
        fields.set("sleepDuration", 7.5);
        fields.set("stressAvg", 28_i64);
        fields
    }

    #[test]
    fn test_coverage_resolution() {
        let today = date("2024-06-30");
        assert_eq!(
            Coverage::All.resolve(date("2024-01-01"), today),
            Some(range("2024-01-01", "2024-06-30"))
        );
        assert_eq!(
            Coverage::Range(range("2024-06-01", "2024-12-31")).resolve(date("2000-01-01"), today),
            Some(range("2024-06-01", "2024-06-30"))
        );
        assert_eq!(
            Coverage::Range(range("2024-07-01", "2024-07-31")).resolve(date("2000-01-01"), today),
            None
        );
    }

    #[test]
    fn test_day_plan_matches_worked_example() {
        let mut table = Table::new(TableKind::Days);
        let markers = Markers::new(TableKind::Days);
        table
            .upsert(RecordKey::Day(date("2024-01-01")), &health_fields())
            .unwrap();

        let planner = Planner::new(TableKind::Days, range("2024-01-01", "2024-01-02"));
        let plan = planner.plan(&table, &markers, |_| true);

        let jan1 = RecordKey::Day(date("2024-01-01"));
        let jan2 = RecordKey::Day(date("2024-01-02"));
        assert_eq!(
            plan,
            vec![
                FetchOp::Listing {
                    kind: TableKind::Days,
                    range: range("2024-01-01", "2024-01-02"),
                },
                FetchOp::Enrichment {
                    key: jan1,
                    date: date("2024-01-01"),
                    category: Category::TrainingReadiness,
                },
                FetchOp::Enrichment {
                    key: jan2.clone(),
                    date: date("2024-01-02"),
                    category: Category::Health,
                },
                FetchOp::Enrichment {
                    key: jan2,
                    date: date("2024-01-02"),
                    category: Category::TrainingReadiness,
                },
            ]
        );
    }

    #[test]
    fn test_complete_days_need_no_listing() {
        let mut table = Table::new(TableKind::Days);
        table
            .upsert(RecordKey::Day(date("2024-01-01")), &FieldSet::new())
            .unwrap();
        let planner = Planner::new(TableKind::Days, DateRange::day(date("2024-01-01")));
        assert!(planner.listing_op(&table).is_none());

        let activities = Planner::new(TableKind::Activities, DateRange::day(date("2024-01-01")));
        assert!(activities.listing_op(&Table::new(TableKind::Activities)).is_some());
    }

    #[test]
    fn test_unavailable_and_present_are_not_replanned() {
        let mut table = Table::new(TableKind::Days);
        let mut markers = Markers::new(TableKind::Days);
        let key = RecordKey::Day(date("2024-01-01"));
        table.upsert(key.clone(), &health_fields()).unwrap();
        markers.insert(key, Category::TrainingReadiness);

        let planner = Planner::new(TableKind::Days, DateRange::day(date("2024-01-01")));
        assert!(planner.enrichment_ops(&table, &markers, |_| true).is_empty());
    }

    #[test]
    fn test_activity_ops_order_and_tracks_last() {
        let mut table = Table::new(TableKind::Activities);
        let markers = Markers::new(TableKind::Activities);
        for (id, start, gps) in [
            (20, "2024-01-02 08:00:00", true),
            (10, "2024-01-01 08:00:00", true),
            (30, "2024-01-03 08:00:00", false),
        ] {
            let mut core = FieldSet::new();
            core.set("startTimeLocal", start);
            core.set("hasPolyline", gps);
            table.insert_core(RecordKey::Activity(id), &core).unwrap();
        }

        let planner = Planner::new(TableKind::Activities, range("2024-01-01", "2024-01-03"));
        let ops = planner.enrichment_ops(&table, &markers, |_| true);

        assert_eq!(ops.len(), 6 + 2);
        assert!(matches!(
            &ops[0],
            FetchOp::Enrichment { key: RecordKey::Activity(10), category: Category::Health, .. }
        ));
        assert!(matches!(
            &ops[5],
            FetchOp::Enrichment { key: RecordKey::Activity(30), category: Category::TrainingReadiness, .. }
        ));
        assert_eq!(
            ops[6..],
            [
                FetchOp::Auxiliary { key: RecordKey::Activity(10), activity_id: 10 },
                FetchOp::Auxiliary { key: RecordKey::Activity(20), activity_id: 20 },
            ]
        );
    }

    #[test]
    fn test_vanished_track_is_replanned() {
        let mut table = Table::new(TableKind::Activities);
        let markers = Markers::new(TableKind::Activities);
        let key = RecordKey::Activity(10);
        let mut core = health_fields();
        core.set("startTimeLocal", "2024-01-01 08:00:00");
        core.set("hasPolyline", true);
        core.set("trainingReadinessScore", 70_i64);
        core.set(TRACK_FILE, "gps_tracks/10.gpx");
        table.insert_core(key.clone(), &core).unwrap();

        let planner = Planner::new(TableKind::Activities, DateRange::day(date("2024-01-01")));
        assert!(planner.enrichment_ops(&table, &markers, |_| true).is_empty());

        let ops = planner.enrichment_ops(&table, &markers, |row| {
            row.get(TRACK_FILE) != Some(&Value::Text("gps_tracks/10.gpx".into()))
        });
        assert_eq!(ops, vec![FetchOp::Auxiliary { key, activity_id: 10 }]);
    }
}
