//! Tabular bulletin snapshots: loading, window selection, and deduplication.
//!
//! The snapshot feed is a workbook with one sheet per year. Each sheet has a
//! timestamp column plus a set of markup-bearing fragment columns.

pub mod dedup;
pub mod window;
pub mod xlsx;

use std::path::Path;

use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use bulletin_cleaner::Cleaner;
use bulletin_shared::{
    BulletinText, CorpusError, RawSnapshotRow, Result, SelectionConfig, SourcesConfig,
};

pub use dedup::{edit_similarity, select_representative, similarity_matrix};
pub use window::select_bulletin;
pub use xlsx::{CellValue, Sheet, Workbook};

/// Snapshot rows read from a year-per-sheet workbook.
pub struct SnapshotSource {
    workbook: Workbook,
    timestamp_column: String,
}

impl SnapshotSource {
    /// Open the workbook at `path`.
    pub fn open(path: &Path, timestamp_column: &str) -> Result<Self> {
        Ok(Self::new(Workbook::open(path)?, timestamp_column))
    }

    /// Open the workbook named by `[sources]`.
    pub fn from_config(sources: &SourcesConfig) -> Result<Self> {
        Self::open(&sources.workbook, &sources.timestamp_column)
    }

    pub fn new(workbook: Workbook, timestamp_column: &str) -> Self {
        Self {
            workbook,
            timestamp_column: timestamp_column.to_string(),
        }
    }

    /// Rows of one year's sheet, ascending by timestamp.
    ///
    /// Rows whose timestamp cell is missing or unparseable are dropped.
    #[instrument(skip(self))]
    pub fn load_year(&mut self, year: i32) -> Result<Vec<RawSnapshotRow>> {
        let sheet = self.workbook.read_sheet(&year.to_string())?;
        let header = sheet.header();

        let ts_col = header
            .iter()
            .find(|(_, name)| **name == self.timestamp_column)
            .map(|(col, _)| *col)
            .ok_or_else(|| {
                CorpusError::Workbook(format!(
                    "sheet {year} has no '{}' column",
                    self.timestamp_column
                ))
            })?;

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for cells in sheet.data_rows() {
            let Some(timestamp) = cells.get(&ts_col).and_then(CellValue::as_timestamp) else {
                dropped += 1;
                continue;
            };
            let mut row = RawSnapshotRow::new(timestamp);
            for (col, value) in cells {
                if *col == ts_col {
                    continue;
                }
                if let Some(name) = header.get(col) {
                    row = row.with_fragment(name.clone(), value.as_text());
                }
            }
            rows.push(row);
        }

        rows.sort_by_key(|r| r.timestamp);
        debug!(year, rows = rows.len(), dropped, "sheet loaded");
        Ok(rows)
    }

    /// Rows of every listed year, concatenated and sorted.
    ///
    /// A year that fails to load contributes nothing; the others still load.
    pub fn load_years(&mut self, years: &[i32]) -> Vec<RawSnapshotRow> {
        let mut all = Vec::new();
        for &year in years {
            match self.load_year(year) {
                Ok(rows) => all.extend(rows),
                Err(e) => warn!(year, error = %e, "skipping year"),
            }
        }
        all.sort_by_key(|r| r.timestamp);
        info!(years = years.len(), rows = all.len(), "snapshot rows loaded");
        all
    }

    /// Bulletin for reference time `at`, read from that year's sheet.
    ///
    /// A window that reaches back into the previous year also reads that sheet.
    pub fn bulletin_at(
        &mut self,
        at: NaiveDateTime,
        config: &SelectionConfig,
        cleaner: &Cleaner,
    ) -> Result<Option<BulletinText>> {
        config.validate()?;
        let first_year = at
            .checked_sub_signed(config.lookback)
            .map_or(at.year(), |start| start.year());
        let years: Vec<i32> = (first_year..=at.year()).collect();
        let rows = self.load_years(&years);
        window::select_bulletin(&rows, at, config, cleaner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulletin_shared::{AppConfig, parse_reference_time};

    fn source() -> SnapshotSource {
        let bytes = xlsx::build_test_workbook(&[
            (
                "2023",
                vec![
                    vec![Some("Datum"), Some("A1"), Some("B1"), Some("C1"), Some("A2")],
                    vec![Some("2023-12-31 23:58:00"), Some("<p>Poledica na cestah</p>"), None, None, None],
                ],
            ),
            (
                "2024",
                vec![
                    vec![Some("Datum"), Some("A1"), Some("B1"), Some("C1"), Some("A2")],
                    vec![Some("2024-01-01 00:05:00"), Some("<p>Zastoj na AC</p>"), None, Some("<p>Burja</p>"), Some("<p>drugo</p>")],
                    vec![Some("ni datum"), Some("<p>izgubljeno</p>"), None, None, None],
                    vec![Some("2024-01-01 00:01:00"), Some("<p>Poledica na cestah</p>"), None, None, None],
                ],
            ),
        ]);
        SnapshotSource::new(Workbook::from_bytes(bytes).expect("workbook"), "Datum")
    }

    #[test]
    fn load_year_drops_bad_timestamps_and_sorts() {
        let mut src = source();
        let rows = src.load_year(2024).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp < rows[1].timestamp);
        assert_eq!(rows[1].fragment("C1"), Some("<p>Burja</p>"));
        assert_eq!(rows[1].fragment("A2"), Some("<p>drugo</p>"));
        assert_eq!(rows[1].fragment("B1"), None);
    }

    #[test]
    fn missing_year_is_skipped() {
        let mut src = source();
        assert!(src.load_year(2022).is_err());
        let rows = src.load_years(&[2022, 2023]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn bulletin_at_uses_primary_columns_only() {
        let mut src = source();
        let config = SelectionConfig::try_from(&AppConfig::default()).expect("valid");
        let at = parse_reference_time("2024-01-01 00:10:00").expect("ts");
        let b = src
            .bulletin_at(at, &config, &Cleaner::default())
            .expect("ok")
            .expect("bulletin");
        assert_eq!(b.text, "Zastoj na AC.\nBurja.");
    }

    #[test]
    fn bulletin_at_reaches_into_previous_year() {
        let mut src = source();
        let config = SelectionConfig::try_from(&AppConfig::default()).expect("valid");
        let at = parse_reference_time("2024-01-01 00:02:00").expect("ts");
        let b = src
            .bulletin_at(at, &config, &Cleaner::default())
            .expect("ok")
            .expect("bulletin");
        assert_eq!(b.text, "Poledica na cestah.");
    }
}
