//! [`RemoteSource`] backed by the Garmin Connect API

use chrono::NaiveDate;
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{Fetched, Listed, ListingPage, RemoteSource};
use crate::client::{GarminClient, OAuth2Token};
use crate::config::CredentialStore;
use crate::error::{GarminError, Result};
use crate::models::{
    ActivitySummary, DateRange, HealthMetrics, TrackFile, TrackFormat, TrainingReadiness,
};
use crate::storage::{Category, FieldSet};
use crate::sync::{with_retry, Outcome, RateLimiter, RetryPolicy};

/// Activities requested per listing page
pub const PAGE_SIZE: u32 = 50;

const PROFILE_PATH: &str = "/userprofile-service/socialProfile";

struct Session {
    client: GarminClient,
    token: OAuth2Token,
    display_name: String,
}

/// Garmin Connect source using stored OAuth tokens
pub struct GarminSource {
    credentials: CredentialStore,
    limiter: RateLimiter,
    retry: RetryPolicy,
    base_url: Option<String>,
    session: Option<Session>,
}

impl GarminSource {
    pub fn new(credentials: CredentialStore, limiter: RateLimiter) -> Self {
        Self {
            credentials,
            limiter,
            retry: RetryPolicy::default(),
            base_url: None,
            session: None,
        }
    }

    /// Policy for loading the user profile during login
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Talk to a custom base URL instead of the token's domain (for testing)
    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(GarminError::NotAuthenticated)
    }

    /// Rate-limited GET; a 404 or an empty body is `None`
    async fn get_json_opt(&self, path: &str) -> Result<Option<Json>> {
        let session = self.session()?;
        self.limiter.wait().await;

        match session.client.get_json_opt::<Json>(&session.token, path).await {
            Ok(value) => {
                self.limiter.on_success();
                Ok(value.filter(|v| !v.is_null()))
            }
            Err(GarminError::NotFound(_)) => {
                self.limiter.on_success();
                debug!(path, "No data");
                Ok(None)
            }
            Err(GarminError::RateLimited) => {
                self.limiter.on_rate_limit();
                Err(GarminError::RateLimited)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_health(&self, date: NaiveDate) -> Result<Fetched<FieldSet>> {
        let display_name = &self.session()?.display_name;
        let mut metrics = HealthMetrics::default();

        let sleep_path = format!(
            "/wellness-service/wellness/dailySleepData/{}?date={}&nonSleepBufferMinutes=60",
            display_name, date
        );
        if let Some(sleep) = self.get_json_opt(&sleep_path).await? {
            metrics.apply_sleep(&sleep);
        }

        let stress_path = format!("/wellness-service/wellness/dailyStress/{}", date);
        if let Some(stress) = self.get_json_opt(&stress_path).await? {
            metrics.apply_stress(&stress);
        }

        let battery_path = format!(
            "/wellness-service/wellness/bodyBattery/reports/daily?startDate={}&endDate={}",
            date, date
        );
        if let Some(battery) = self.get_json_opt(&battery_path).await? {
            metrics.apply_body_battery(&battery);
        }

        let rhr_path = format!(
            "/userstats-service/wellness/daily/{}?fromDate={}&untilDate={}&metricId=60",
            display_name, date, date
        );
        if let Some(rhr) = self.get_json_opt(&rhr_path).await? {
            metrics.apply_resting_heart_rate(&rhr);
        }

        let steps_path = format!("/usersummary-service/stats/steps/daily/{}/{}", date, date);
        if let Some(steps) = self.get_json_opt(&steps_path).await? {
            metrics.apply_daily_steps(&steps);
        }

        Ok(non_empty(metrics.into_fields()))
    }

    async fn fetch_readiness(&self, date: NaiveDate) -> Result<Fetched<FieldSet>> {
        let mut readiness = TrainingReadiness::default();

        let readiness_path = format!("/metrics-service/metrics/trainingreadiness/{}", date);
        if let Some(value) = self.get_json_opt(&readiness_path).await? {
            readiness.apply_readiness(&value);
        }

        let status_path = format!("/metrics-service/metrics/trainingstatus/aggregated/{}", date);
        if let Some(value) = self.get_json_opt(&status_path).await? {
            readiness.apply_training_status(&value);
        }

        Ok(non_empty(readiness.into_fields()))
    }
}

/// A category with every field null is a confirmed absence
fn non_empty(fields: FieldSet) -> Fetched<FieldSet> {
    if fields.is_empty() {
        Fetched::NotAvailable
    } else {
        Fetched::Data(fields)
    }
}

impl RemoteSource for GarminSource {
    async fn authenticate(&mut self) -> Result<()> {
        let (oauth1, token) = self.credentials.session()?;
        let client = match &self.base_url {
            Some(url) => GarminClient::new_with_base_url(url)?,
            None => GarminClient::new(&oauth1.domain)?,
        };

        let (limiter, client_ref, token_ref) = (&self.limiter, &client, &token);
        let outcome = with_retry(&self.retry, "load user profile", move || async move {
            limiter.wait().await;
            match client_ref.get_json::<Json>(token_ref, PROFILE_PATH).await {
                Ok(profile) => {
                    limiter.on_success();
                    Ok(Fetched::Data(profile))
                }
                Err(GarminError::RateLimited) => {
                    limiter.on_rate_limit();
                    Err(GarminError::RateLimited)
                }
                Err(e) => Err(e),
            }
        })
        .await?;
        let profile = match outcome {
            Outcome::Done(profile) => profile,
            Outcome::NotAvailable => return Err(GarminError::auth("Could not load user profile")),
            Outcome::Skipped(e) => {
                return Err(GarminError::auth(format!("Could not load user profile: {}", e)))
            }
        };

        let display_name = profile
            .get("displayName")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| GarminError::auth("Could not get display name"))?;

        info!(profile = self.credentials.profile(), %display_name, "Authenticated");
        self.session = Some(Session {
            client,
            token,
            display_name,
        });
        Ok(())
    }

    async fn list_activities(&self, range: DateRange, cursor: u32) -> Result<ListingPage> {
        let path = format!(
            "/activitylist-service/activities/search/activities?startDate={}&endDate={}&start={}&limit={}",
            range.start(),
            range.end(),
            cursor,
            PAGE_SIZE
        );
        let value = self.get_json_opt(&path).await?.unwrap_or(Json::Array(Vec::new()));
        let activities: Vec<ActivitySummary> = serde_json::from_value(value).map_err(|e| {
            GarminError::invalid_response(format!("Unexpected activity list: {}", e))
        })?;

        let next = (activities.len() as u32 >= PAGE_SIZE).then_some(cursor + PAGE_SIZE);
        let records = activities
            .iter()
            .filter(|a| a.start_date().is_some_and(|d| range.contains(d)))
            .map(|a| Listed {
                key: a.key(),
                core: a.core_fields(),
            })
            .collect();

        Ok(ListingPage { records, next })
    }

    async fn fetch_enrichment(
        &self,
        date: NaiveDate,
        category: Category,
    ) -> Result<Fetched<FieldSet>> {
        match category {
            Category::Health => self.fetch_health(date).await,
            Category::TrainingReadiness => self.fetch_readiness(date).await,
            Category::Track => Err(GarminError::invalid_param(
                "Tracks are fetched per activity, not per date",
            )),
        }
    }

    async fn fetch_auxiliary(&self, activity_id: i64) -> Result<Fetched<TrackFile>> {
        let session = self.session()?;

        for format in TrackFormat::PREFERENCE {
            self.limiter.wait().await;
            match session
                .client
                .download(&session.token, &format.download_path(activity_id))
                .await
            {
                Ok(bytes) if !bytes.is_empty() => {
                    self.limiter.on_success();
                    return Ok(Fetched::Data(TrackFile { format, bytes }));
                }
                Ok(_) | Err(GarminError::NotFound(_)) => {
                    self.limiter.on_success();
                    debug!(activity_id, %format, "No track in this format");
                }
                Err(GarminError::RateLimited) => {
                    self.limiter.on_rate_limit();
                    return Err(GarminError::RateLimited);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Fetched::NotAvailable)
    }
}
