use std::fmt;

use chrono::{Days, NaiveDate};

use crate::error::{GarminError, Result};

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(GarminError::invalid_param(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar dates in the range
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every date in the range, oldest first
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.checked_add_days(Days::new(1)))
            .take_while(move |d| *d <= end)
    }

    /// Same range with the end pulled back to `limit`, or `None` when the
    /// whole range lies after it
    pub fn clamp_end(&self, limit: NaiveDate) -> Option<Self> {
        if self.start > limit {
            return None;
        }
        Some(Self {
            start: self.start,
            end: self.end.min(limit),
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| GarminError::InvalidDateFormat(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_days_inclusive_across_month_end() {
        let range = DateRange::new(date("2024-01-30"), date("2024-02-02")).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(
            days,
            vec![
                date("2024-01-30"),
                date("2024-01-31"),
                date("2024-02-01"),
                date("2024-02-02")
            ]
        );
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(DateRange::new(date("2024-02-01"), date("2024-01-01")).is_err());
    }

    #[test]
    fn test_clamp_end() {
        let range = DateRange::new(date("2024-01-01"), date("2024-12-31")).unwrap();
        let clamped = range.clamp_end(date("2024-06-30")).unwrap();
        assert_eq!(clamped.end(), date("2024-06-30"));
        assert!(range.clamp_end(date("2023-12-31")).is_none());
    }

    #[test]
    fn test_parse_date_error() {
        assert!(matches!(
            parse_date("01/02/2024"),
            Err(GarminError::InvalidDateFormat(_))
        ));
    }
}
