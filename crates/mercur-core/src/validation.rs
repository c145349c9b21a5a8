//! Input validation helpers.
//!
//! All of these run before a transaction is opened and surface
//! `invalid_argument` on failure.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// An inclusive `[start_date, end_date]` request period, both `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl DateRange {
    /// Parses both bounds; the end date is inclusive (callers compare with
    /// `>= lower` and `< upper`).
    pub fn bounds(&self) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>)> {
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        date_range_bounds(start, end)
    }

    /// Parses the bounds of a range where either side may be blank.
    /// Returns `(Option<lower>, Option<upper>)`.
    pub fn open_bounds(
        &self,
    ) -> ServiceResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let midnight = NaiveTime::MIN;
        let lower = if self.start_date.trim().is_empty() {
            None
        } else {
            Some(
                parse_date("start_date", &self.start_date)?
                    .and_time(midnight)
                    .and_utc(),
            )
        };
        let upper = if self.end_date.trim().is_empty() {
            None
        } else {
            let end = parse_date("end_date", &self.end_date)?;
            Some(
                end.checked_add_days(Days::new(1))
                    .ok_or_else(|| ServiceError::invalid_argument("end_date out of range"))?
                    .and_time(midnight)
                    .and_utc(),
            )
        };
        Ok((lower, upper))
    }
}

/// Requires a positive numeric identifier.
pub fn require_id(field: &str, id: impl Into<i64>) -> ServiceResult<()> {
    if id.into() <= 0 {
        return Err(ServiceError::invalid_argument(format!("{field} required")));
    }
    Ok(())
}

/// Requires a non-empty string field.
pub fn require_str<'a>(field: &str, value: &'a str) -> ServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid_argument(format!("{field} required")));
    }
    Ok(trimmed)
}

/// Requires a strictly positive quantity.
pub fn require_positive(field: &str, quantity: i32) -> ServiceResult<()> {
    if quantity <= 0 {
        return Err(ServiceError::invalid_argument(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` request date.
pub fn parse_date(field: &str, value: &str) -> ServiceResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::invalid_argument(format!("{field} must be a YYYY-MM-DD date"))
    })
}

/// Converts an inclusive `[start, end]` date range into half-open UTC
/// timestamp bounds `[start, end + 1 day)` for `>= .. <` comparisons.
pub fn date_range_bounds(
    start: NaiveDate,
    end: NaiveDate,
) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>)> {
    if end < start {
        return Err(ServiceError::invalid_argument(
            "end_date must not precede start_date",
        ));
    }
    let midnight = NaiveTime::MIN;
    let lower = start.and_time(midnight).and_utc();
    let upper = end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ServiceError::invalid_argument("end_date out of range"))?
        .and_time(midnight)
        .and_utc();
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_quantities() {
        assert!(require_id("product_id", 0i64).is_err());
        assert!(require_id("product_id", -4i64).is_err());
        assert!(require_id("product_id", 7i64).is_ok());
        assert!(require_positive("quantity", 0).is_err());
        assert!(require_positive("quantity", 3).is_ok());
    }

    #[test]
    fn strings_are_trimmed() {
        assert!(require_str("document_number", "  ").is_err());
        assert_eq!(require_str("document_number", " INV-1 ").unwrap(), "INV-1");
    }

    #[test]
    fn date_range_is_end_inclusive() {
        let start = parse_date("start", "2026-03-01").unwrap();
        let end = parse_date("end", "2026-03-31").unwrap();
        let (lo, hi) = date_range_bounds(start, end).unwrap();
        assert_eq!(lo.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        // end + 1 day, compared with strict less-than
        assert_eq!(hi.to_rfc3339(), "2026-04-01T00:00:00+00:00");

        assert!(date_range_bounds(end, start).is_err());
        assert!(parse_date("start", "03/01/2026").is_err());
    }

    #[test]
    fn open_ranges_allow_blank_sides() {
        let range = DateRange {
            start_date: "2026-03-01".into(),
            end_date: String::new(),
        };
        let (lo, hi) = range.open_bounds().unwrap();
        assert!(lo.is_some());
        assert!(hi.is_none());

        let range = DateRange::default();
        let (lo, hi) = range.open_bounds().unwrap();
        assert!(lo.is_none() && hi.is_none());
    }
}
