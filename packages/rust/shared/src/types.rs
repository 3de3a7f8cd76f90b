//! Core domain types for the bulletin corpus.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// Input format for reference times and tabular timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cleaned bulletin text keyed by (minute-floored) timestamp.
pub type CorpusMap = BTreeMap<NaiveDateTime, String>;

/// Archive report body keyed by its embedded timestamp.
pub type ArchiveMap = BTreeMap<NaiveDateTime, String>;

// ---------------------------------------------------------------------------
// RawSnapshotRow
// ---------------------------------------------------------------------------

/// One timestamped row of the tabular bulletin feed, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshotRow {
    pub timestamp: NaiveDateTime,
    /// Non-blank fragment cells keyed by column name. Absent key = null cell.
    pub fragments: BTreeMap<String, String>,
}

impl RawSnapshotRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            fragments: BTreeMap::new(),
        }
    }

    /// Builder-style fragment insertion; blank values are treated as null.
    pub fn with_fragment(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fragments.insert(column.into(), value);
        }
        self
    }

    pub fn fragment(&self, column: &str) -> Option<&str> {
        self.fragments.get(column).map(String::as_str)
    }

    /// Space-join the present fragments of `columns`, in the given order.
    pub fn combine(&self, columns: &[String]) -> String {
        columns
            .iter()
            .filter_map(|c| self.fragment(c))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// BulletinText
// ---------------------------------------------------------------------------

/// A cleaned, human-readable bulletin for one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinText {
    pub timestamp: NaiveDateTime,
    pub text: String,
}

// ---------------------------------------------------------------------------
// ArchiveDocument
// ---------------------------------------------------------------------------

/// One timestamped report found inside an archive document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOccurrence {
    pub timestamp: NaiveDateTime,
    pub body: String,
}

/// A converted archive document with every report occurrence it contains.
///
/// Only the extracted occurrences are kept; the converted document text is
/// dropped once the marker split is done.
#[derive(Debug, Clone)]
pub struct ArchiveDocument {
    pub path: PathBuf,
    /// In text order.
    pub occurrences: Vec<ArchiveOccurrence>,
}

// ---------------------------------------------------------------------------
// MatchedPair
// ---------------------------------------------------------------------------

/// A generated bulletin paired with the archive report broadcast after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// Timestamp of the generated (tabular) bulletin.
    pub timestamp: NaiveDateTime,
    pub archive_timestamp: NaiveDateTime,
    pub generated_text: String,
    pub archive_text: String,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

/// Truncate seconds and sub-seconds.
pub fn floor_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Parse a `YYYY-MM-DD HH:MM:SS` reference time.
pub fn parse_reference_time(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), TIMESTAMP_FORMAT).map_err(|e| {
        CorpusError::parse(format!(
            "invalid time '{input}' (expected YYYY-MM-DD HH:MM:SS): {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_reference_time(s).expect("valid timestamp")
    }

    #[test]
    fn combine_skips_null_fragments_in_column_order() {
        let row = RawSnapshotRow::new(ts("2024-03-01 08:10:00"))
            .with_fragment("C1", "<p>tretji</p>")
            .with_fragment("A1", "<p>prvi</p>")
            .with_fragment("B1", "   ");
        let cols = vec!["A1".to_string(), "B1".to_string(), "C1".to_string()];
        assert_eq!(row.combine(&cols), "<p>prvi</p> <p>tretji</p>");
    }

    #[test]
    fn combine_empty_row_is_empty_string() {
        let row = RawSnapshotRow::new(ts("2024-03-01 08:10:00"));
        assert_eq!(row.combine(&["A1".to_string()]), "");
    }

    #[test]
    fn floor_to_minute_drops_seconds() {
        assert_eq!(
            floor_to_minute(ts("2023-04-19 18:40:59")),
            ts("2023-04-19 18:40:00")
        );
    }

    #[test]
    fn parse_reference_time_rejects_bad_input() {
        assert!(parse_reference_time("19. 4. 2023 18.40").is_err());
        assert!(parse_reference_time(" 2023-04-19 18:40:00 ").is_ok());
    }

    #[test]
    fn matched_pair_serialization() {
        let pair = MatchedPair {
            timestamp: ts("2023-04-19 18:35:00"),
            archive_timestamp: ts("2023-04-19 18:40:00"),
            generated_text: "Zastoj na AC.".into(),
            archive_text: "Zastoj na AC.".into(),
            score: 1.0,
        };
        let json = serde_json::to_string(&pair).expect("serialize");
        let parsed: MatchedPair = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, pair);
    }
}
