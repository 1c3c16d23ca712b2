//! Typed views of Garmin Connect responses
//!
//! Raw JSON is parsed here into fixed per-category structs, so the planner
//! and merge code only ever see [`FieldSet`](crate::storage::FieldSet)s.

pub mod activity;
mod date_range;
pub mod health;
pub mod readiness;
pub mod track;

pub use activity::ActivitySummary;
pub use date_range::{parse_date, DateRange};
pub use health::HealthMetrics;
pub use readiness::TrainingReadiness;
pub use track::{TrackFile, TrackFormat};

/// Integer view of a JSON number; floats are rounded
pub(crate) fn value_to_i64(value: &serde_json::Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    value.as_f64().map(|float| float.round() as i64)
}

/// First element of an array, or the value itself when it is not one
pub(crate) fn first_entry(value: &serde_json::Value) -> Option<&serde_json::Value> {
    if let Some(array) = value.as_array() {
        array.first()
    } else if value.is_null() {
        None
    } else {
        Some(value)
    }
}
