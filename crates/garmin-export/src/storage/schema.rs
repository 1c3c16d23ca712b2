//! Column layout of the exported tables

use std::fmt;
use std::str::FromStr;

use crate::error::GarminError;

/// Key column of the activities table
pub const ACTIVITY_KEY: &str = "activityId";
/// Key column of the daily health table
pub const DAY_KEY: &str = "date";
/// Local start time; doubles as the dashboard's row timestamp
pub const START_TIME_LOCAL: &str = "startTimeLocal";
/// Set when the service holds a GPS track for the activity
pub const HAS_POLYLINE: &str = "hasPolyline";
/// Path of the downloaded track, relative to the table's directory
pub const TRACK_FILE: &str = "gpsTrackFile";

const ACTIVITY_CORE: &[&str] = &[
    ACTIVITY_KEY,
    "activityName",
    "activityType",
    START_TIME_LOCAL,
    "startTimeGMT",
    "duration",
    "distance",
    "calories",
    "averageHR",
    "maxHR",
    "averageSpeed",
    "maxSpeed",
    "elevationGain",
    "elevationLoss",
    HAS_POLYLINE,
];

const DAY_CORE: &[&str] = &[DAY_KEY];

const HEALTH_FIELDS: &[&str] = &[
    "sleepDuration",
    "sleepDeepDuration",
    "sleepLightDuration",
    "sleepRemDuration",
    "sleepAwakeDuration",
    "sleepQuality",
    "stressAvg",
    "stressMax",
    "stressRestDuration",
    "stressLowDuration",
    "stressMediumDuration",
    "stressHighDuration",
    "bodyBatteryAvg",
    "bodyBatteryMax",
    "bodyBatteryMin",
    "restingHeartRate",
    "dailySteps",
];

const READINESS_FIELDS: &[&str] = &[
    "trainingReadinessScore",
    "trainingReadiness",
    "trainingStatus",
    "trainingStatusText",
];

const TRACK_FIELDS: &[&str] = &[TRACK_FILE];

/// The two exported tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// One row per activity, keyed by activity id
    Activities,
    /// One row per calendar date
    Days,
}

impl TableKind {
    /// Name used in logs and in `sync.db`
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Activities => "activities",
            TableKind::Days => "days",
        }
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            TableKind::Activities => ACTIVITY_KEY,
            TableKind::Days => DAY_KEY,
        }
    }

    /// Service-sourced columns, written once when the row is created
    pub fn core_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Activities => ACTIVITY_CORE,
            TableKind::Days => DAY_CORE,
        }
    }

    /// Enrichment categories in planning order; auxiliary categories last
    pub fn categories(&self) -> &'static [Category] {
        match self {
            TableKind::Activities => &[
                Category::Health,
                Category::TrainingReadiness,
                Category::Track,
            ],
            TableKind::Days => &[Category::Health, Category::TrainingReadiness],
        }
    }

    /// Canonical column order: core columns, then each category's fields
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = self.core_columns().to_vec();
        for category in self.categories() {
            columns.extend_from_slice(category.fields());
        }
        columns
    }

    pub fn is_core(&self, column: &str) -> bool {
        self.core_columns().contains(&column)
    }

    pub fn is_known(&self, column: &str) -> bool {
        self.is_core(column) || self.categories().iter().any(|c| c.fields().contains(&column))
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableKind {
    type Err = GarminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activities" => Ok(TableKind::Activities),
            "days" => Ok(TableKind::Days),
            other => Err(GarminError::invalid_param(format!("Unknown table: {}", other))),
        }
    }
}

/// A named group of enrichment fields fetched together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Sleep, stress, body battery, resting heart rate, steps
    Health,
    /// Training readiness score and training status
    TrainingReadiness,
    /// Downloaded GPS track file (auxiliary)
    Track,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Health => "health",
            Category::TrainingReadiness => "training_readiness",
            Category::Track => "track",
        }
    }

    /// All columns owned by the category
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Category::Health => HEALTH_FIELDS,
            Category::TrainingReadiness => READINESS_FIELDS,
            Category::Track => TRACK_FIELDS,
        }
    }

    /// Which non-null columns make the category present.
    ///
    /// The remaining fields are filled whenever a fetch returns them but never
    /// cause a category to be fetched again.
    pub fn completeness(&self) -> Completeness {
        match self {
            Category::Health => Completeness::AllOf(&["sleepDuration", "stressAvg"]),
            // Devices without readiness still report a training status
            Category::TrainingReadiness => {
                Completeness::AnyOf(&["trainingReadinessScore", "trainingStatus"])
            }
            Category::Track => Completeness::AllOf(TRACK_FIELDS),
        }
    }

    /// Auxiliary categories produce files rather than field values
    pub fn is_auxiliary(&self) -> bool {
        matches!(self, Category::Track)
    }
}

/// Rule deciding when a category counts as present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    AllOf(&'static [&'static str]),
    AnyOf(&'static [&'static str]),
}

impl Completeness {
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Completeness::AllOf(fields) | Completeness::AnyOf(fields) => fields,
        }
    }

    /// Whether the rule holds given which columns are non-null
    pub fn is_met(&self, present: impl Fn(&str) -> bool) -> bool {
        match self {
            Completeness::AllOf(fields) => fields.iter().all(|field| present(field)),
            Completeness::AnyOf(fields) => fields.iter().any(|field| present(field)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = GarminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health" => Ok(Category::Health),
            "training_readiness" => Ok(Category::TrainingReadiness),
            "track" => Ok(Category::Track),
            other => Err(GarminError::invalid_param(format!("Unknown category: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_start_with_key() {
        assert_eq!(TableKind::Activities.columns()[0], "activityId");
        assert_eq!(TableKind::Days.columns()[0], "date");
    }

    #[test]
    fn test_day_table_has_no_track_column() {
        assert!(!TableKind::Days.columns().contains(&TRACK_FILE));
        assert!(TableKind::Activities.columns().contains(&TRACK_FILE));
    }

    #[test]
    fn test_columns_are_unique() {
        for kind in [TableKind::Activities, TableKind::Days] {
            let columns = kind.columns();
            let mut sorted = columns.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), columns.len(), "{} has duplicate columns", kind);
        }
    }

    #[test]
    fn test_completeness_fields_belong_to_category() {
        for category in [Category::Health, Category::TrainingReadiness, Category::Track] {
            for field in category.completeness().fields() {
                assert!(category.fields().contains(field));
            }
        }
    }

    #[test]
    fn test_readiness_complete_with_status_alone() {
        let rule = Category::TrainingReadiness.completeness();
        assert!(rule.is_met(|field| field == "trainingStatus"));
        assert!(rule.is_met(|field| field == "trainingReadinessScore"));
        assert!(!rule.is_met(|field| field == "trainingStatusText"));

        let health = Category::Health.completeness();
        assert!(!health.is_met(|field| field == "sleepDuration"));
        assert!(health.is_met(|field| field == "sleepDuration" || field == "stressAvg"));
    }

    #[test]
    fn test_names_parse_back() {
        for category in [Category::Health, Category::TrainingReadiness, Category::Track] {
            assert_eq!(category.name().parse::<Category>().unwrap(), category);
        }
        assert_eq!("days".parse::<TableKind>().unwrap(), TableKind::Days);
        assert!("weight".parse::<TableKind>().is_err());
    }

    #[test]
    fn test_track_is_last_and_auxiliary() {
        let categories = TableKind::Activities.categories();
        assert_eq!(categories.last(), Some(&Category::Track));
        assert!(Category::Track.is_auxiliary());
        assert!(!Category::Health.is_auxiliary());
    }
}
