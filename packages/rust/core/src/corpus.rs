//! Whole-dataset corpus: one cleaned bulletin per minute.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use bulletin_cleaner::Cleaner;
use bulletin_shared::{CorpusMap, RawSnapshotRow, Result, floor_to_minute};
use bulletin_storage::CacheStore;

/// Build the minute-keyed corpus from snapshot rows.
///
/// Rows are grouped by their timestamp floored to the minute. Within a group
/// the chronologically last row wins; its `columns` are combined, cleaned,
/// and kept when the result is non-empty.
pub fn build_corpus(rows: &[RawSnapshotRow], columns: &[String], cleaner: &Cleaner) -> CorpusMap {
    let mut ordered: Vec<&RawSnapshotRow> = rows.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut latest: BTreeMap<_, &RawSnapshotRow> = BTreeMap::new();
    for row in ordered {
        latest.insert(floor_to_minute(row.timestamp), row);
    }

    let groups = latest.len();
    let corpus: CorpusMap = latest
        .into_iter()
        .filter_map(|(minute, row)| {
            cleaner
                .clean(&row.combine(columns))
                .map(|text| (minute, text))
        })
        .collect();

    debug!(rows = rows.len(), groups, kept = corpus.len(), "corpus built");
    corpus
}

/// Load the cached corpus, or build and persist a fresh one.
///
/// An unreadable cache is logged and rebuilt. `force` skips the load. A
/// failed build returns its error and leaves the cache file untouched; a
/// failed write is logged and the built corpus is still returned.
pub fn load_or_build<F>(store: &CacheStore, force: bool, build: F) -> Result<CorpusMap>
where
    F: FnOnce() -> Result<CorpusMap>,
{
    if !force {
        match store.load() {
            Ok(Some(corpus)) => {
                info!(path = %store.path().display(), entries = corpus.len(), "using cached corpus");
                return Ok(corpus);
            }
            Ok(None) => info!(path = %store.path().display(), "no cached corpus"),
            Err(e) => warn!(path = %store.path().display(), error = %e, "cached corpus unusable, rebuilding"),
        }
    }

    let corpus = build()?;
    if let Err(e) = store.save(&corpus) {
        warn!(error = %e, "failed to persist corpus");
    }
    Ok(corpus)
}
