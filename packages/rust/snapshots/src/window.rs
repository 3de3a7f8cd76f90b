//! Lookback-window selection of a single bulletin from snapshot rows.

use chrono::NaiveDateTime;
use tracing::debug;

use bulletin_cleaner::Cleaner;
use bulletin_shared::{BulletinText, RawSnapshotRow, Result, SelectionConfig};

use crate::dedup;

/// Rows with timestamps in `[at - lookback, at]`, ascending by timestamp.
pub fn rows_in_window<'a>(
    rows: &'a [RawSnapshotRow],
    at: NaiveDateTime,
    config: &SelectionConfig,
) -> Vec<&'a RawSnapshotRow> {
    let start = at
        .checked_sub_signed(config.lookback)
        .unwrap_or(NaiveDateTime::MIN);
    let mut selected: Vec<&RawSnapshotRow> = rows
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= at)
        .collect();
    selected.sort_by_key(|r| r.timestamp);
    selected
}

/// Columns from `columns` that hold a value in at least one of `rows`.
pub fn present_columns(rows: &[&RawSnapshotRow], columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| rows.iter().any(|r| r.fragment(c).is_some()))
        .cloned()
        .collect()
}

/// Select, deduplicate, and clean the bulletin for reference time `at`.
///
/// `Ok(None)` means the window holds no rows, or the chosen row cleans to
/// nothing.
pub fn select_bulletin(
    rows: &[RawSnapshotRow],
    at: NaiveDateTime,
    config: &SelectionConfig,
    cleaner: &Cleaner,
) -> Result<Option<BulletinText>> {
    config.validate()?;

    let window = rows_in_window(rows, at, config);
    if window.is_empty() {
        debug!(%at, "no snapshot rows in window");
        return Ok(None);
    }

    let columns = present_columns(&window, &config.columns);
    let combined: Vec<String> = window.iter().map(|r| r.combine(&columns)).collect();

    let Some(index) = dedup::select_representative(&combined, config.threshold) else {
        return Ok(None);
    };

    debug!(
        %at,
        candidates = combined.len(),
        representative = %window[index].timestamp,
        "representative row selected"
    );

    Ok(cleaner.clean(&combined[index]).map(|text| BulletinText {
        timestamp: at,
        text,
    }))
}
