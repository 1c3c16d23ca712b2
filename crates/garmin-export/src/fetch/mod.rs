//! Remote fetch boundary
//!
//! [`RemoteSource`] is everything the export core needs from the service.
//! Responses cross it already validated into [`FieldSet`]s and track bytes.

mod garmin;

pub use garmin::GarminSource;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{DateRange, TrackFile};
use crate::storage::{Category, FieldSet, RecordKey};

/// Result of a fetch that reached the service
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    /// The service has nothing for this key and category; not an error
    NotAvailable,
}

/// A record returned by a listing, reduced to its core columns
#[derive(Debug, Clone, PartialEq)]
pub struct Listed {
    pub key: RecordKey,
    pub core: FieldSet,
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub records: Vec<Listed>,
    /// Cursor of the following page, `None` on the last one
    pub next: Option<u32>,
}

/// Source of remote records.
///
/// Every call is independently failable. Errors are classified through
/// [`GarminError::is_fatal`](crate::GarminError::is_fatal) and
/// [`GarminError::is_retryable`](crate::GarminError::is_retryable).
#[allow(async_fn_in_trait)]
pub trait RemoteSource {
    /// Establish the session for the run; failure aborts the run
    async fn authenticate(&mut self) -> Result<()>;

    /// One page of activities started within `range`; paging restarts from `cursor`
    async fn list_activities(&self, range: DateRange, cursor: u32) -> Result<ListingPage>;

    /// Calendar dates that exist remotely within `range`.
    ///
    /// The service keeps a day for every calendar date, so the default
    /// answers without a request.
    async fn list_days(&self, range: DateRange) -> Result<ListingPage> {
        Ok(ListingPage {
            records: range
                .days()
                .map(|date| Listed {
                    key: RecordKey::Day(date),
                    core: FieldSet::new(),
                })
                .collect(),
            next: None,
        })
    }

    /// Field values of an enrichment category for a date
    async fn fetch_enrichment(&self, date: NaiveDate, category: Category)
        -> Result<Fetched<FieldSet>>;

    /// GPS track bytes of an activity
    async fn fetch_auxiliary(&self, activity_id: i64) -> Result<Fetched<TrackFile>>;
}
