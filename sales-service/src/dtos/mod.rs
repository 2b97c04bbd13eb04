pub mod collections;
pub mod records;
pub mod sales;

pub use collections::*;
pub use records::*;
pub use sales::*;

use crate::error::SalesError;
use crate::normalizer::parse_date_and_time;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Query-string date bounds. A bare `YYYY-MM-DD` end date covers the whole day.
pub(crate) fn parse_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), SalesError> {
    let start = start
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_bound(s, false))
        .transpose()?;
    let end = end
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_bound(s, true))
        .transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(SalesError::validation("startDate must not be after endDate"));
        }
    }
    Ok((start, end))
}

fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, SalesError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
        } else {
            NaiveTime::MIN
        };
        return Ok(day.and_time(time).and_utc());
    }
    parse_date_and_time(raw, None)
        .ok_or_else(|| SalesError::validation(format!("Unrecognised date: {}", raw)))
}

/// A body date for a single instant (`YYYY-MM-DD` or ISO-8601).
pub(crate) fn parse_instant(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, SalesError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date_and_time(value, None)
            .map(Some)
            .ok_or_else(|| SalesError::validation(format!("Unrecognised date: {}", value))),
        None => Ok(None),
    }
}
