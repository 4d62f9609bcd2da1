//! Integer `YYYYMMDDHHMM` timestamps.
//!
//! The catalog stores every instant as a plain integer such as
//! `202401010000`. Consumers compare these numerically, so the codec here is
//! the single place that knows the layout.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

use crate::error::{ModelError, Result};

/// `strftime` layout of a stamp, for log and file-name rendering.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Encode an instant as `YYYYMMDDHHMM`. Seconds are dropped.
pub fn to_stamp(ts: NaiveDateTime) -> u64 {
    let year = u64::try_from(ts.year()).unwrap_or(0);
    year * 100_000_000
        + u64::from(ts.month()) * 1_000_000
        + u64::from(ts.day()) * 10_000
        + u64::from(ts.hour()) * 100
        + u64::from(ts.minute())
}

/// Decode a `YYYYMMDDHHMM` integer.
pub fn from_stamp(stamp: u64) -> Result<NaiveDateTime> {
    let minute = (stamp % 100) as u32;
    let hour = ((stamp / 100) % 100) as u32;
    let day = ((stamp / 10_000) % 100) as u32;
    let month = ((stamp / 1_000_000) % 100) as u32;
    let year = i32::try_from(stamp / 100_000_000)
        .map_err(|_| ModelError::InvalidStamp(stamp.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| ModelError::InvalidStamp(stamp.to_string()))
}

/// Parse a stamp from text, e.g. a CLI argument or a file stem.
pub fn parse_stamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.len() != 12 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModelError::InvalidStamp(raw.to_string()));
    }
    let value: u64 = trimmed
        .parse()
        .map_err(|_| ModelError::InvalidStamp(raw.to_string()))?;
    from_stamp(value)
}

/// `#[serde(with = "stamp")]` adapter for `NaiveDateTime` fields.
pub fn serialize<S>(
    ts: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(to_stamp(*ts))
}

/// See [`serialize`].
pub fn deserialize<'de, D>(
    deserializer: D,
) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = u64::deserialize(deserializer)?;
    from_stamp(raw).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_encodes_minute_resolution() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 42)
            .unwrap();
        assert_eq!(to_stamp(ts), 202401010000);
    }

    #[test]
    fn from_stamp_rejects_impossible_dates() {
        assert!(from_stamp(202402300000).is_err());
        assert!(from_stamp(202401012460).is_err());
        assert_eq!(
            from_stamp(202312312359).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap()
        );
    }

    #[test]
    fn parse_stamp_requires_twelve_digits() {
        assert!(parse_stamp("2024010100").is_err());
        assert!(parse_stamp("20240101000x").is_err());
        assert!(parse_stamp(" 202401010005 ").is_ok());
    }
}
