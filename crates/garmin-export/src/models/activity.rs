//! Activity data models for Garmin Connect API
//!
//! These structures represent activities returned from the activity list
//! endpoint and their mapping onto the core columns of the activities table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse_date;
use crate::storage::{FieldSet, RecordKey};

/// Activity summary returned from the activity list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Unique activity identifier
    pub activity_id: i64,

    /// User-provided or auto-generated activity name
    #[serde(default)]
    pub activity_name: Option<String>,

    /// Start time in local timezone (`YYYY-MM-DD HH:MM:SS`)
    #[serde(default)]
    pub start_time_local: Option<String>,

    /// Start time in GMT
    #[serde(default, rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,

    /// Activity type information
    #[serde(default)]
    pub activity_type: Option<ActivityType>,

    /// Distance in meters
    #[serde(default)]
    pub distance: Option<f64>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    /// Calories burned
    #[serde(default)]
    pub calories: Option<f64>,

    /// Average heart rate in bpm
    #[serde(default, rename = "averageHR")]
    pub average_hr: Option<f64>,

    /// Maximum heart rate in bpm
    #[serde(default, rename = "maxHR")]
    pub max_hr: Option<f64>,

    /// Average speed in m/s
    #[serde(default)]
    pub average_speed: Option<f64>,

    /// Maximum speed in m/s
    #[serde(default)]
    pub max_speed: Option<f64>,

    /// Total elevation gain in meters
    #[serde(default)]
    pub elevation_gain: Option<f64>,

    /// Total elevation loss in meters
    #[serde(default)]
    pub elevation_loss: Option<f64>,

    /// Whether the activity has GPS data
    #[serde(default)]
    pub has_polyline: Option<bool>,
}

/// Activity type information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    /// Type key (e.g., "running", "cycling", "walking")
    pub type_key: String,
}

impl ActivitySummary {
    pub fn key(&self) -> RecordKey {
        RecordKey::Activity(self.activity_id)
    }

    /// Local calendar date the activity started on
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_time_local
            .as_deref()
            .and_then(|s| s.get(..10))
            .and_then(|d| parse_date(d).ok())
    }

    /// Core columns of the activities table
    pub fn core_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.set("activityId", self.activity_id);
        fields.set_opt("activityName", self.activity_name.clone());
        fields.set_opt(
            "activityType",
            self.activity_type.as_ref().map(|t| t.type_key.clone()),
        );
        fields.set_opt("startTimeLocal", self.start_time_local.clone());
        fields.set_opt("startTimeGMT", self.start_time_gmt.clone());
        fields.set_opt("duration", self.duration);
        fields.set_opt("distance", self.distance);
        fields.set_opt("calories", self.calories);
        fields.set_opt("averageHR", self.average_hr);
        fields.set_opt("maxHR", self.max_hr);
        fields.set_opt("averageSpeed", self.average_speed);
        fields.set_opt("maxSpeed", self.max_speed);
        fields.set_opt("elevationGain", self.elevation_gain);
        fields.set_opt("elevationLoss", self.elevation_loss);
        fields.set("hasPolyline", self.has_polyline.unwrap_or(false));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    const SAMPLE: &str = r#"{
        "activityId": 14512345678,
        "activityName": "Zurich Running",
        "startTimeLocal": "2024-03-05 07:12:44",
        "startTimeGMT": "2024-03-05 06:12:44",
        "activityType": { "typeKey": "running", "typeId": 1 },
        "distance": 10012.5,
        "duration": 3012.0,
        "averageHR": 151.0,
        "maxHR": 176.0,
        "hasPolyline": true,
        "ownerDisplayName": "someone"
    }"#;

    #[test]
    fn test_parse_summary() {
        let activity: ActivitySummary = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(activity.key(), RecordKey::Activity(14512345678));
        assert_eq!(activity.start_date(), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(activity.activity_type.as_ref().unwrap().type_key, "running");
        assert_eq!(activity.start_time_gmt.as_deref(), Some("2024-03-05 06:12:44"));
    }

    #[test]
    fn test_core_fields() {
        let activity: ActivitySummary = serde_json::from_str(SAMPLE).unwrap();
        let fields = activity.core_fields();
        assert_eq!(fields.get("activityType"), Some(&Value::Text("running".into())));
        assert_eq!(fields.get("averageHR"), Some(&Value::Float(151.0)));
        assert_eq!(fields.get("hasPolyline"), Some(&Value::Bool(true)));
        assert!(fields.get("calories").is_none());
    }

    #[test]
    fn test_missing_polyline_means_no_track() {
        let activity: ActivitySummary =
            serde_json::from_str(r#"{ "activityId": 1, "startTimeLocal": "2024-01-01 10:00:00" }"#)
                .unwrap();
        assert_eq!(activity.core_fields().get("hasPolyline"), Some(&Value::Bool(false)));
    }
}
