use std::fmt;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, Result};
use crate::stamp;

/// Identity of one upstream scan: the source tag plus its UTC start minute.
///
/// Two file names that parse to the same tag and minute are the same logical
/// scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanKey {
    source_tag: String,
    timestamp: NaiveDateTime,
}

impl ScanKey {
    pub fn new(source_tag: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            source_tag: source_tag.into(),
            timestamp: truncate_to_minute(timestamp),
        }
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Hour-aligned run this scan belongs to.
    pub fn run_key(&self) -> RunKey {
        RunKey::containing(self.timestamp)
    }

    /// Minute offset inside [`Self::run_key`].
    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }

    /// Canonical upstream file name, `<tag>_<YYYYMMDD>_<HHMM>`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}",
            self.source_tag,
            self.timestamp.format("%Y%m%d_%H%M")
        )
    }

    /// The scan minute as a catalog stamp (`YYYYMMDDHHMM`).
    pub fn stamp(&self) -> u64 {
        stamp::to_stamp(self.timestamp)
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Hour-aligned start of a product run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunKey(NaiveDateTime);

impl RunKey {
    /// Run that contains `ts`.
    pub fn containing(ts: NaiveDateTime) -> Self {
        let start = ts
            .date()
            .and_hms_opt(ts.hour(), 0, 0)
            .unwrap_or_else(|| truncate_to_minute(ts));
        Self(start)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.0
    }

    /// File stem of the run document: `YYYYMMDDHH00`.
    pub fn document_stem(&self) -> String {
        self.0.format("%Y%m%d%H00").to_string()
    }

    /// Relative directory of the run's images: `YYYY/MM/DD/HH00/`.
    pub fn path_extension(&self) -> String {
        self.0.format("%Y/%m/%d/%H00/").to_string()
    }

    /// Absolute frame time for a minute offset inside this run.
    pub fn frame_time(&self, minute: u32) -> Result<NaiveDateTime> {
        if minute >= 60 {
            return Err(ModelError::InvalidMinute(minute));
        }
        Ok(self.0 + Duration::minutes(i64::from(minute)))
    }

    /// Inverse of [`Self::document_stem`].
    pub fn parse_document_stem(raw: &str) -> Result<Self> {
        let ts = stamp::parse_stamp(raw)
            .map_err(|_| ModelError::InvalidRunKey(raw.to_string()))?;
        if ts.minute() != 0 {
            return Err(ModelError::InvalidRunKey(raw.to_string()));
        }
        Ok(Self(ts))
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document_stem())
    }
}

impl Serialize for RunKey {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        stamp::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for RunKey {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        stamp::deserialize(deserializer).map(RunKey::containing)
    }
}

fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}
