//! # Temporal Types
//!
//! All instants are UTC. Invoice issue/due dates and payment dates are
//! calendar dates (`YYYY-MM-DD`) with no time component.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A UTC instant.
///
/// Serializes as RFC 3339 with millisecond precision and a `Z` suffix
/// (e.g. `2026-01-15T12:00:00.000Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// The underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The calendar date of this instant in UTC.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// ISO-8601 with millisecond precision and `Z` suffix.
    pub fn to_iso_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_calendar_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_string_has_millis_and_z() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap());
        assert_eq!(ts.to_iso_string(), "2026-01-15T12:00:00.000Z");
        assert_eq!(ts.to_string(), "2026-01-15T12:00:00.000Z");
    }

    #[test]
    fn serde_uses_iso_string() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap());
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-01-15T12:00:00.000Z\"");
        let back: Timestamp = serde_json::from_str("\"2026-01-15T17:30:00+05:30\"").unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn date_is_utc_calendar_day() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap());
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn parse_calendar_date_accepts_iso_dates() {
        let d = parse_calendar_date("2026-10-18").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert!(parse_calendar_date(" 2026-10-18 ").is_ok());
    }

    #[test]
    fn parse_calendar_date_rejects_garbage() {
        assert!(matches!(
            parse_calendar_date("18/10/2026"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(parse_calendar_date("2026-02-30").is_err());
    }
}
