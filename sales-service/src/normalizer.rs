//! Date and amount normalization shared by both record schemas.
//!
//! Everything here is pure: no clock, no I/O. A date that cannot be parsed is
//! reported as such (`unparsed = true`) instead of being replaced by the
//! current time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use mongodb::bson::Bson;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for every money value.
pub const MONEY_SCALE: u32 = 2;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

/// Date parts as a stored record carries them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDate<'a> {
    pub timestamp: Option<DateTime<Utc>>,
    pub date: Option<&'a str>,
    pub time: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDate {
    pub timestamp: Option<DateTime<Utc>>,
    pub unparsed: bool,
}

impl NormalizedDate {
    pub fn parsed(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            unparsed: false,
        }
    }

    pub fn unparsed() -> Self {
        Self {
            timestamp: None,
            unparsed: true,
        }
    }

    /// `YYYY-MM-DD` of the effective timestamp.
    pub fn date(&self) -> Option<String> {
        self.timestamp.map(|ts| ts.format("%Y-%m-%d").to_string())
    }

    /// `HH:MM:SS` of the effective timestamp.
    pub fn time(&self) -> Option<String> {
        self.timestamp.map(|ts| ts.format("%H:%M:%S").to_string())
    }
}

/// Resolve a record's effective timestamp.
///
/// Order: native timestamp, full ISO-8601/RFC 3339 string (naive values are
/// UTC), then `YYYY-MM-DD` combined with the separate time-of-day field.
pub fn normalize_date(raw: RawDate<'_>) -> NormalizedDate {
    if let Some(ts) = raw.timestamp {
        return NormalizedDate::parsed(ts);
    }

    match raw.date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => parse_date_and_time(date, raw.time)
            .map(NormalizedDate::parsed)
            .unwrap_or_else(NormalizedDate::unparsed),
        None => NormalizedDate::unparsed(),
    }
}

/// Strict variant for intake: `None` means the caller supplied a date that
/// cannot be understood.
pub fn parse_date_and_time(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time_of_day = time.and_then(parse_time).unwrap_or(NaiveTime::MIN);
    Some(day.and_time(time_of_day).and_utc())
}

/// `HH:MM`, `HH:MM:SS` or `h:MM AM/PM`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let upper = raw.to_ascii_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
}

/// Round a money value to the ledger's scale, always carrying two places.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Read a stored amount regardless of how an older writer encoded it.
pub fn amount_from_bson(value: &Bson) -> Option<Decimal> {
    let amount = match value {
        Bson::Double(v) => Decimal::from_f64(*v)?,
        Bson::Int32(v) => Decimal::from(*v),
        Bson::Int64(v) => Decimal::from(*v),
        Bson::String(s) => s.trim().parse::<Decimal>().ok()?,
        _ => return None,
    };
    Some(money(amount))
}

/// Legacy writers store amounts as doubles.
pub fn amount_to_bson_double(amount: Decimal) -> Bson {
    use rust_decimal::prelude::ToPrimitive;
    Bson::Double(amount.to_f64().unwrap_or_default())
}
