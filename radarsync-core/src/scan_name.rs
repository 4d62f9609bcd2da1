//! Recognizes acquirable scan files by name.
//!
//! Upstream names scans `<TAG>_<YYYYMMDD>_<HHMM>`. Anything without the tag
//! or carrying the annotated marker is someone else's file and is skipped
//! without noise; a tagged name whose timestamp does not parse is reported.

use std::fmt;

use chrono::NaiveDateTime;
use radarsync_config::SourceConfig;
use radarsync_model::ScanKey;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TIMESTAMP_LEN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingTag,
    Annotated,
    MalformedTimestamp,
}

impl Rejection {
    /// Silent rejections are expected neighbours in the upstream directory.
    pub fn is_silent(self) -> bool {
        !matches!(self, Rejection::MalformedTimestamp)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::MissingTag => "missing source tag",
            Rejection::Annotated => "already annotated upstream",
            Rejection::MalformedTimestamp => "malformed timestamp",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone)]
pub struct ScanNameParser {
    tag: String,
    annotated_marker: String,
}

/// Names from one listing split by outcome.
#[derive(Debug, Default, Clone)]
pub struct PartitionedNames {
    /// Unique keys in ascending time order.
    pub keys: Vec<ScanKey>,
    pub malformed: Vec<String>,
    pub ignored: usize,
}

impl ScanNameParser {
    pub fn new(
        tag: impl Into<String>,
        annotated_marker: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            annotated_marker: annotated_marker.into(),
        }
    }

    pub fn from_config(source: &SourceConfig) -> Self {
        Self::new(source.tag.clone(), source.annotated_marker.clone())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parse(&self, name: &str) -> Result<ScanKey, Rejection> {
        let name = name.trim();
        if !name.contains(self.tag.as_str()) {
            return Err(Rejection::MissingTag);
        }
        if !self.annotated_marker.is_empty()
            && name.contains(self.annotated_marker.as_str())
        {
            return Err(Rejection::Annotated);
        }

        let raw = name
            .strip_prefix(self.tag.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or(Rejection::MalformedTimestamp)?;
        if !has_timestamp_shape(raw) {
            return Err(Rejection::MalformedTimestamp);
        }
        let timestamp = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map_err(|_| Rejection::MalformedTimestamp)?;

        Ok(ScanKey::new(self.tag.clone(), timestamp))
    }

    pub fn partition<'a, I>(&self, names: I) -> PartitionedNames
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = PartitionedNames::default();
        for name in names {
            match self.parse(name) {
                Ok(key) => out.keys.push(key),
                Err(reason) if reason.is_silent() => out.ignored += 1,
                Err(_) => out.malformed.push(name.trim().to_string()),
            }
        }
        out.keys.sort();
        out.keys.dedup();
        out
    }
}

/// `YYYYMMDD_HHMM` with ASCII digits only; chrono alone accepts short fields.
fn has_timestamp_shape(raw: &str) -> bool {
    raw.len() == TIMESTAMP_LEN
        && raw.bytes().enumerate().all(|(idx, byte)| match idx {
            8 => byte == b'_',
            _ => byte.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parser() -> ScanNameParser {
        ScanNameParser::new("TAMU", "_annotated")
    }

    #[test]
    fn parses_canonical_names() {
        let key = parser().parse("TAMU_20240101_0005").unwrap();
        assert_eq!(
            key.timestamp(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 5, 0)
                .unwrap()
        );
        assert_eq!(key.file_name(), "TAMU_20240101_0005");
    }

    #[test]
    fn foreign_and_annotated_names_are_silent() {
        let parser = parser();
        assert_eq!(parser.parse("dir.list"), Err(Rejection::MissingTag));
        assert_eq!(
            parser.parse("TAMU_20240101_0005_annotated"),
            Err(Rejection::Annotated)
        );
        assert!(Rejection::MissingTag.is_silent());
        assert!(Rejection::Annotated.is_silent());
    }

    #[test]
    fn malformed_timestamps_are_reported() {
        let parser = parser();
        for name in [
            "TAMU_2024011_0005",
            "TAMU_20240101-0005",
            "TAMU_20241301_0005",
            "TAMU_20240101_0005.gz",
            "xTAMU_20240101_0005",
        ] {
            assert_eq!(
                parser.parse(name),
                Err(Rejection::MalformedTimestamp),
                "{name}"
            );
        }
        assert!(!Rejection::MalformedTimestamp.is_silent());
    }

    #[test]
    fn partition_sorts_and_dedups() {
        let out = parser().partition([
            "TAMU_20240101_0010",
            "TAMU_20240101_0000",
            "TAMU_20240101_0010",
            "dir.list",
            "TAMU_20240101_0000_annotated",
            "TAMU_bogus",
        ]);
        let names: Vec<String> =
            out.keys.iter().map(ScanKey::file_name).collect();
        assert_eq!(names, vec!["TAMU_20240101_0000", "TAMU_20240101_0010"]);
        assert_eq!(out.malformed, vec!["TAMU_bogus"]);
        assert_eq!(out.ignored, 2);
    }
}
