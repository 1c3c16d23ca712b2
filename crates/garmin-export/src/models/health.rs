//! Daily health metrics assembled from the wellness endpoints

use serde_json::Value as Json;

use super::{first_entry, value_to_i64};
use crate::storage::FieldSet;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// The `health` category of one calendar date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthMetrics {
    /// Hours
    pub sleep_duration: Option<f64>,
    pub sleep_deep_duration: Option<f64>,
    pub sleep_light_duration: Option<f64>,
    pub sleep_rem_duration: Option<f64>,
    pub sleep_awake_duration: Option<f64>,
    pub sleep_quality: Option<i64>,
    pub stress_avg: Option<i64>,
    pub stress_max: Option<i64>,
    /// Seconds
    pub stress_rest_duration: Option<i64>,
    pub stress_low_duration: Option<i64>,
    pub stress_medium_duration: Option<i64>,
    pub stress_high_duration: Option<i64>,
    pub body_battery_avg: Option<f64>,
    pub body_battery_max: Option<i64>,
    pub body_battery_min: Option<i64>,
    pub resting_heart_rate: Option<i64>,
    pub daily_steps: Option<i64>,
}

impl HealthMetrics {
    pub fn into_fields(self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.set_opt("sleepDuration", self.sleep_duration);
        fields.set_opt("sleepDeepDuration", self.sleep_deep_duration);
        fields.set_opt("sleepLightDuration", self.sleep_light_duration);
        fields.set_opt("sleepRemDuration", self.sleep_rem_duration);
        fields.set_opt("sleepAwakeDuration", self.sleep_awake_duration);
        fields.set_opt("sleepQuality", self.sleep_quality);
        fields.set_opt("stressAvg", self.stress_avg);
        fields.set_opt("stressMax", self.stress_max);
        fields.set_opt("stressRestDuration", self.stress_rest_duration);
        fields.set_opt("stressLowDuration", self.stress_low_duration);
        fields.set_opt("stressMediumDuration", self.stress_medium_duration);
        fields.set_opt("stressHighDuration", self.stress_high_duration);
        fields.set_opt("bodyBatteryAvg", self.body_battery_avg);
        fields.set_opt("bodyBatteryMax", self.body_battery_max);
        fields.set_opt("bodyBatteryMin", self.body_battery_min);
        fields.set_opt("restingHeartRate", self.resting_heart_rate);
        fields.set_opt("dailySteps", self.daily_steps);
        fields
    }

    /// Fill sleep fields from `dailySleepData`.
    ///
    /// Zero durations mean the watch recorded nothing and stay null.
    pub fn apply_sleep(&mut self, value: &Json) {
        let Some(dto) = value.get("dailySleepDTO").or_else(|| value.get("sleep")) else {
            return;
        };

        let hours = |name: &str| {
            dto.get(name)
                .and_then(|v| v.as_f64())
                .filter(|s| *s > 0.0)
                .map(|s| s / SECONDS_PER_HOUR)
        };
        self.sleep_duration = hours("sleepTimeSeconds");
        self.sleep_deep_duration = hours("deepSleepSeconds");
        self.sleep_light_duration = hours("lightSleepSeconds");
        self.sleep_rem_duration = hours("remSleepSeconds");
        self.sleep_awake_duration = hours("awakeSleepSeconds");

        self.sleep_quality = dto
            .get("sleepScores")
            .and_then(|v| v.get("overall"))
            .and_then(|v| v.get("value"))
            .and_then(value_to_i64)
            .or_else(|| dto.get("sleepQualityScore").and_then(value_to_i64))
            .or_else(|| dto.get("sleepQuality").and_then(value_to_i64));
    }

    /// Fill stress fields from `dailyStress`
    pub fn apply_stress(&mut self, value: &Json) {
        let Some(stress) = first_entry(value) else {
            return;
        };
        self.stress_avg = stress
            .get("avgStressLevel")
            .or_else(|| stress.get("averageStressLevel"))
            .and_then(value_to_i64)
            .filter(|v| *v >= 0);
        self.stress_max = stress
            .get("maxStressLevel")
            .and_then(value_to_i64)
            .filter(|v| *v >= 0);
        self.stress_rest_duration = stress.get("restStressDuration").and_then(value_to_i64);
        self.stress_low_duration = stress.get("lowStressDuration").and_then(value_to_i64);
        self.stress_medium_duration = stress.get("mediumStressDuration").and_then(value_to_i64);
        self.stress_high_duration = stress.get("highStressDuration").and_then(value_to_i64);
    }

    /// Fill body battery fields from the daily report, falling back to the
    /// raw `[timestamp, level]` samples when the summary values are absent
    pub fn apply_body_battery(&mut self, value: &Json) {
        let Some(report) = first_entry(value) else {
            return;
        };

        self.body_battery_avg = report.get("averageBodyBattery").and_then(|v| v.as_f64());
        self.body_battery_max = report.get("maxBodyBattery").and_then(value_to_i64);
        self.body_battery_min = report.get("minBodyBattery").and_then(value_to_i64);

        if self.body_battery_max.is_some() {
            return;
        }
        let levels: Vec<i64> = report
            .get("bodyBatteryValuesArray")
            .and_then(|v| v.as_array())
            .map(|samples| {
                samples
                    .iter()
                    .filter_map(|s| s.get(1).and_then(value_to_i64))
                    .collect()
            })
            .unwrap_or_default();
        if levels.is_empty() {
            return;
        }
        self.body_battery_max = levels.iter().max().copied();
        self.body_battery_min = levels.iter().min().copied();
        self.body_battery_avg = Some(levels.iter().sum::<i64>() as f64 / levels.len() as f64);
    }

    /// Fill resting heart rate from the user stats metrics map
    pub fn apply_resting_heart_rate(&mut self, value: &Json) {
        self.resting_heart_rate = value
            .get("allMetrics")
            .and_then(|v| v.get("metricsMap"))
            .and_then(|v| v.get("WELLNESS_RESTING_HEART_RATE"))
            .and_then(|v| v.as_array())
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.get("value"))
            .or_else(|| value.get("value"))
            .and_then(value_to_i64);
    }

    /// Fill the step count from the daily steps list (last entry wins)
    pub fn apply_daily_steps(&mut self, value: &Json) {
        self.daily_steps = value
            .as_array()
            .and_then(|entries| entries.last())
            .and_then(|entry| entry.get("totalSteps"))
            .and_then(value_to_i64);
    }
}
