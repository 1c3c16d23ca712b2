//! Training readiness and training status for one day

use serde_json::Value as Json;

use super::{first_entry, value_to_i64};
use crate::storage::FieldSet;

/// The `training_readiness` category of one calendar date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReadiness {
    pub score: Option<i64>,
    /// Readiness level, e.g. `MODERATE`
    pub level: Option<String>,
    /// Numeric training status code
    pub status: Option<i64>,
    /// Feedback phrase, e.g. `PRODUCTIVE_3`
    pub status_text: Option<String>,
}

impl TrainingReadiness {
    pub fn into_fields(self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.set_opt("trainingReadinessScore", self.score);
        fields.set_opt("trainingReadiness", self.level);
        fields.set_opt("trainingStatus", self.status);
        fields.set_opt("trainingStatusText", self.status_text);
        fields
    }

    /// Fill score and level from the readiness list of a date
    pub fn apply_readiness(&mut self, value: &Json) {
        let Some(entry) = first_entry(value) else {
            return;
        };
        self.score = entry.get("score").and_then(value_to_i64);
        self.level = entry
            .get("level")
            .and_then(|v| v.as_str())
            .map(str::to_string);
    }

    /// Fill status from the aggregated training status.
    ///
    /// The response holds one entry per device; the primary training device
    /// wins, otherwise the first entry.
    pub fn apply_training_status(&mut self, value: &Json) {
        let Some(devices) = value
            .get("mostRecentTrainingStatus")
            .and_then(|v| v.get("latestTrainingStatusData"))
            .and_then(|v| v.as_object())
        else {
            return;
        };

        let entry = devices
            .values()
            .find(|e| e.get("primaryTrainingDevice").and_then(|v| v.as_bool()) == Some(true))
            .or_else(|| devices.values().next());
        let Some(entry) = entry else {
            return;
        };

        self.status = entry.get("trainingStatus").and_then(value_to_i64);
        self.status_text = entry
            .get("trainingStatusFeedbackPhrase")
            .and_then(|v| v.as_str())
            .map(str::to_string);
    }
}
