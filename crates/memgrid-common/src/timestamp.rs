//! Bounded SQL TIMESTAMP value
//!
//! A microsecond-resolution instant restricted to the proleptic Gregorian
//! range `1583-01-01 00:00:00.000000` through `9999-12-31 23:59:59.999999`
//! (UTC), plus a distinguished NULL sentinel. Every constructor path
//! validates the range; values are immutable once built and safely
//! shareable across threads.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Microseconds since the Unix epoch at 1583-01-01 00:00:00.000000 UTC
pub const MIN_MICROS: i64 = -12_212_553_600_000_000;
/// Microseconds since the Unix epoch at 9999-12-31 23:59:59.999999 UTC
pub const MAX_MICROS: i64 = 253_402_300_799_999_999;
/// The NULL sentinel, the only representable value outside the valid range
pub const NULL_MICROS: i64 = i64::MIN;

const MIN_STRING: &str = "1583-01-01 00:00:00.000000";
const MAX_STRING: &str = "9999-12-31 23:59:59.999999";

/// Microsecond-accurate SQL timestamp value.
///
/// Stored as a 64-bit count of microseconds since the Unix epoch. Ordering
/// and equality are natural on the integer, which places the NULL sentinel
/// below every valid value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SqlTimestamp {
    usecs: i64,
}

impl SqlTimestamp {
    /// Create a timestamp from microseconds since the Unix epoch.
    ///
    /// The NULL sentinel is accepted; any other value outside the valid
    /// window is rejected.
    pub fn from_micros(usecs: i64) -> Result<Self> {
        if usecs == NULL_MICROS {
            return Ok(Self { usecs });
        }
        if !(MIN_MICROS..=MAX_MICROS).contains(&usecs) {
            return Err(Error::TimestampOutOfRange(format!(
                "{MIN_STRING} to {MAX_STRING}"
            )));
        }
        Ok(Self { usecs })
    }

    /// Create a timestamp from an instant, truncated to millisecond
    /// resolution. The microsecond sub-part of the result is zero.
    pub fn from_instant(instant: DateTime<Utc>) -> Result<Self> {
        Self::from_micros(instant.timestamp_millis() * 1000)
    }

    /// Parse a timestamp from `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or
    /// `YYYY-MM-DD HH:MM:SS.ffffff` (one to six fractional digits).
    ///
    /// A date-only form defaults the time to midnight. The year field must
    /// be exactly four digits; five-digit years are a format error, not a
    /// range error. More than six fractional digits cannot be represented
    /// and are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (date_part, time_part) = match trimmed.split_once(' ') {
            Some((date, time)) => (date, Some(time)),
            None => (trimmed, None),
        };

        let date = parse_date(date_part, input)?;
        let time = match time_part {
            Some(part) => parse_time(part, input)?,
            None => NaiveTime::MIN,
        };

        Self::from_micros(NaiveDateTime::new(date, time).and_utc().timestamp_micros())
    }

    /// The smallest valid timestamp, 1583-01-01 00:00:00.000000 UTC
    #[must_use]
    pub fn min() -> Self {
        Self { usecs: MIN_MICROS }
    }

    /// The largest valid timestamp, 9999-12-31 23:59:59.999999 UTC
    #[must_use]
    pub fn max() -> Self {
        Self { usecs: MAX_MICROS }
    }

    /// The NULL sentinel
    #[must_use]
    pub fn null() -> Self {
        Self { usecs: NULL_MICROS }
    }

    /// Whether this value is the NULL sentinel
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.usecs == NULL_MICROS
    }

    /// Microseconds since the Unix epoch
    #[must_use]
    pub fn micros(&self) -> i64 {
        self.usecs
    }

    /// Project to a millisecond-resolution instant.
    ///
    /// Fails when the value carries a non-zero sub-millisecond part, which
    /// includes the NULL sentinel.
    pub fn as_instant(&self) -> Result<DateTime<Utc>> {
        if self.usecs % 1000 != 0 {
            return Err(Error::TimestampPrecisionLoss);
        }
        DateTime::from_timestamp_millis(self.usecs / 1000).ok_or_else(|| {
            Error::TimestampOutOfRange(format!("{MIN_STRING} to {MAX_STRING}"))
        })
    }

    /// Canonical string form in UTC: `YYYY-MM-DD HH:MM:SS.uuuuuu`, always
    /// six fractional digits. The NULL sentinel renders as `NULL`.
    #[must_use]
    pub fn to_string_utc(&self) -> String {
        if self.is_null() {
            return "NULL".to_string();
        }
        let secs = self.usecs.div_euclid(1_000_000);
        let micros = self.usecs.rem_euclid(1_000_000) as u32;
        DateTime::<Utc>::from_timestamp(secs, micros * 1000)
            .map(|instant| format!("{}.{micros:06}", instant.format("%Y-%m-%d %H:%M:%S")))
            .unwrap_or_else(|| format!("<unrepresentable: {} usec>", self.usecs))
    }
}

impl fmt::Display for SqlTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_utc())
    }
}

impl FromStr for SqlTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SqlTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.usecs)
    }
}

impl<'de> Deserialize<'de> for SqlTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let usecs = i64::deserialize(deserializer)?;
        Self::from_micros(usecs).map_err(serde::de::Error::custom)
    }
}

fn all_digits(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn parse_date(field: &str, original: &str) -> Result<NaiveDate> {
    let mut parts = field.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::timestamp_format(original));
    };

    // The year must be exactly four digits so an over-long year reads as a
    // malformed string rather than an out-of-range instant.
    if year.len() != 4 || !all_digits(year) {
        return Err(Error::timestamp_format(original));
    }
    if month.len() > 2 || day.len() > 2 || !all_digits(month) || !all_digits(day) {
        return Err(Error::timestamp_format(original));
    }

    let year: i32 = year.parse().map_err(|_| Error::timestamp_format(original))?;
    let month: u32 = month.parse().map_err(|_| Error::timestamp_format(original))?;
    let day: u32 = day.parse().map_err(|_| Error::timestamp_format(original))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| Error::timestamp_format(original))
}

fn parse_time(field: &str, original: &str) -> Result<NaiveTime> {
    let (clock, fraction) = match field.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (field, None),
    };

    let mut parts = clock.split(':');
    let (Some(hour), Some(minute), Some(second), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::timestamp_format(original));
    };
    for unit in [hour, minute, second] {
        if unit.len() > 2 || !all_digits(unit) {
            return Err(Error::timestamp_format(original));
        }
    }

    let micros = match fraction {
        Some(digits) => {
            if !all_digits(digits) {
                return Err(Error::timestamp_format(original));
            }
            if digits.len() > 6 {
                return Err(Error::TimestampSubMicrosecond);
            }
            let parsed: u32 = digits.parse().map_err(|_| Error::timestamp_format(original))?;
            parsed * 10u32.pow(6 - digits.len() as u32)
        }
        None => 0,
    };

    let hour: u32 = hour.parse().map_err(|_| Error::timestamp_format(original))?;
    let minute: u32 = minute.parse().map_err(|_| Error::timestamp_format(original))?;
    let second: u32 = second.parse().map_err(|_| Error::timestamp_format(original))?;

    NaiveTime::from_hms_micro_opt(hour, minute, second, micros)
        .ok_or_else(|| Error::timestamp_format(original))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIX_EPOCH_STRING: &str = "1970-01-01 00:00:00.000000";

    #[test]
    fn test_canonical_strings() {
        assert_eq!(SqlTimestamp::min().to_string_utc(), MIN_STRING);
        assert_eq!(SqlTimestamp::max().to_string_utc(), MAX_STRING);
        assert_eq!(
            SqlTimestamp::from_micros(0).unwrap().to_string_utc(),
            UNIX_EPOCH_STRING
        );
    }

    #[test]
    fn test_negative_micros_borrow_from_the_second() {
        let just_before_epoch = SqlTimestamp::from_micros(-1).unwrap();
        assert_eq!(
            just_before_epoch.to_string_utc(),
            "1969-12-31 23:59:59.999999"
        );
    }

    #[test]
    fn test_out_of_range_construction() {
        for usecs in [MIN_MICROS - 1, MAX_MICROS + 1] {
            let err = SqlTimestamp::from_micros(usecs).unwrap_err();
            assert!(
                err.to_string().contains("outside of the supported range"),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn test_five_digit_year_is_a_format_error() {
        let err = SqlTimestamp::parse("10000-01-01 00:00:00.000").unwrap_err();
        assert!(matches!(err, Error::TimestampFormat(_)), "got {err:?}");
    }

    #[test]
    fn test_pre_gregorian_is_a_range_error() {
        let err = SqlTimestamp::parse("1582-12-31 23:59:59.999").unwrap_err();
        assert!(matches!(err, Error::TimestampOutOfRange(_)), "got {err:?}");
    }

    #[test]
    fn test_parse_accepted_forms() {
        let midnight = SqlTimestamp::parse("2011-06-24").unwrap();
        assert_eq!(midnight, SqlTimestamp::parse("2011-06-24 00:00:00").unwrap());
        assert_eq!(
            SqlTimestamp::parse("2000-01-01 00:00:00.5").unwrap().micros(),
            946_684_800_500_000
        );
        assert_eq!(
            SqlTimestamp::parse("2000-01-01 00:00:00.000001")
                .unwrap()
                .micros(),
            946_684_800_000_001
        );
        assert_eq!(SqlTimestamp::parse(MIN_STRING).unwrap(), SqlTimestamp::min());
        assert_eq!(SqlTimestamp::parse(MAX_STRING).unwrap(), SqlTimestamp::max());
    }

    #[test]
    fn test_parse_rejects_sub_microseconds() {
        let err = SqlTimestamp::parse("2000-01-01 00:00:00.1234567").unwrap_err();
        assert!(matches!(err, Error::TimestampSubMicrosecond), "got {err:?}");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in [
            "",
            "not a date",
            "2000/01/01",
            "2000-13-01",
            "2000-01-32",
            "2000-01-01 25:00:00",
            "2000-01-01 00:00",
            "2000-01-01 00:00:00.",
        ] {
            let err = SqlTimestamp::parse(input).unwrap_err();
            assert!(matches!(err, Error::TimestampFormat(_)), "input {input:?} gave {err:?}");
        }
    }

    #[test]
    fn test_round_trip() {
        for usecs in [MIN_MICROS, -1, 0, 1, 946_684_800_123_456, MAX_MICROS] {
            let value = SqlTimestamp::from_micros(usecs).unwrap();
            assert_eq!(SqlTimestamp::parse(&value.to_string_utc()).unwrap(), value);
        }
    }

    #[test]
    fn test_from_instant_truncates_to_millis() {
        let max_millis = DateTime::from_timestamp_millis(MAX_MICROS / 1000).unwrap();
        let value = SqlTimestamp::from_instant(max_millis).unwrap();
        assert_eq!(value.micros(), MAX_MICROS - 999);

        let over = DateTime::from_timestamp_millis(MAX_MICROS / 1000 + 1).unwrap();
        assert!(SqlTimestamp::from_instant(over).is_err());
    }

    #[test]
    fn test_as_instant_requires_millisecond_resolution() {
        let on_the_milli = SqlTimestamp::from_micros(1_000).unwrap();
        assert_eq!(on_the_milli.as_instant().unwrap().timestamp_millis(), 1);

        let off_the_milli = SqlTimestamp::from_micros(1_001).unwrap();
        assert!(off_the_milli.as_instant().is_err());
        assert!(SqlTimestamp::null().as_instant().is_err());
    }

    #[test]
    fn test_null_sentinel() {
        let null = SqlTimestamp::null();
        assert!(null.is_null());
        assert_eq!(null.micros(), NULL_MICROS);
        assert_eq!(null.to_string_utc(), "NULL");
        assert!(null < SqlTimestamp::min());
    }

    #[test]
    fn test_factories() {
        assert_eq!(SqlTimestamp::min().micros(), MIN_MICROS);
        assert_eq!(SqlTimestamp::max().micros(), MAX_MICROS);
        assert!(!SqlTimestamp::min().is_null());
        assert!(!SqlTimestamp::max().is_null());
    }

    #[test]
    fn test_ordering_is_natural_on_micros() {
        let earlier = SqlTimestamp::parse("1999-12-31 23:59:59.999999").unwrap();
        let later = SqlTimestamp::parse("2000-01-01").unwrap();
        assert!(earlier < later);
        assert_eq!(later, SqlTimestamp::from_micros(946_684_800_000_000).unwrap());
    }

    #[test]
    fn test_serde_preserves_the_sentinel_on_the_wire() {
        let null = SqlTimestamp::null();
        let encoded = serde_json::to_string(&null).unwrap();
        assert_eq!(encoded, NULL_MICROS.to_string());
        assert_eq!(serde_json::from_str::<SqlTimestamp>(&encoded).unwrap(), null);

        // Deserialization re-validates.
        let bad = (MAX_MICROS + 1).to_string();
        assert!(serde_json::from_str::<SqlTimestamp>(&bad).is_err());
    }
}
