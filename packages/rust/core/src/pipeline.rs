//! End-to-end workflows over the configured sources.

use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, instrument};

use bulletin_archive::{ArchiveHit, ArchiveScanner};
use bulletin_cleaner::Cleaner;
use bulletin_shared::{
    AppConfig, ArchiveConfig, BulletinText, CorpusError, CorpusMap, MatchedPair, Result,
    SelectionConfig,
};
use bulletin_snapshots::SnapshotSource;
use bulletin_storage::CacheStore;

use crate::corpus;
use crate::matcher;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _summary: &str) {}
}

/// Result of [`run_match`].
#[derive(Debug)]
pub struct MatchReport {
    pub pairs: Vec<MatchedPair>,
    /// Corpus entries inside the requested range.
    pub generated: usize,
    /// Archive reports loaded for the range.
    pub archive_reports: usize,
    pub elapsed: std::time::Duration,
}

/// Bulletin for reference time `at`, selected from the snapshot workbook.
#[instrument(skip(config))]
pub fn bulletin_at(config: &AppConfig, at: NaiveDateTime) -> Result<Option<BulletinText>> {
    let selection = SelectionConfig::try_from(config)?;
    let mut source = SnapshotSource::from_config(&config.sources)?;
    source.bulletin_at(at, &selection, &Cleaner::default())
}

/// Archive report broadcast in the match window after `at`.
#[instrument(skip(config))]
pub fn archive_at(config: &AppConfig, at: NaiveDateTime) -> Result<Option<ArchiveHit>> {
    ArchiveScanner::new(ArchiveConfig::try_from(config)?).point_lookup(at)
}

/// Build the whole-dataset corpus from the workbook, ignoring any cache.
pub fn build_corpus_from_sources(config: &AppConfig) -> Result<CorpusMap> {
    let mut source = SnapshotSource::from_config(&config.sources)?;
    let rows = source.load_years(&config.sources.years);
    if rows.is_empty() {
        return Err(CorpusError::Workbook(format!(
            "no snapshot rows found for years {:?}",
            config.sources.years
        )));
    }
    Ok(corpus::build_corpus(
        &rows,
        &config.sources.primary_columns,
        &Cleaner::default(),
    ))
}

/// Load the cached corpus, rebuilding it when missing, unusable, or forced.
#[instrument(skip(config, progress))]
pub fn build_cache(
    config: &AppConfig,
    force: bool,
    progress: &dyn ProgressReporter,
) -> Result<CorpusMap> {
    let start = Instant::now();
    let store = CacheStore::new(&config.cache.path);

    progress.phase("Loading corpus");
    let corpus = corpus::load_or_build(&store, force, || {
        progress.phase("Building corpus from workbook");
        build_corpus_from_sources(config)
    })?;

    let summary = format!(
        "{} bulletins in {:.1}s",
        corpus.len(),
        start.elapsed().as_secs_f64()
    );
    progress.done(&summary);
    Ok(corpus)
}

/// Pair corpus bulletins generated on `from..=to` with archive reports.
#[instrument(skip(config, progress))]
pub fn run_match(
    config: &AppConfig,
    from: NaiveDate,
    to: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<MatchReport> {
    if from > to {
        return Err(CorpusError::validation(format!(
            "range start {from} is after range end {to}"
        )));
    }
    let start = Instant::now();
    let archive_config = ArchiveConfig::try_from(config)?;
    let window = archive_config.match_window;

    let store = CacheStore::new(&config.cache.path);
    progress.phase("Loading corpus");
    let corpus = corpus::load_or_build(&store, false, || {
        progress.phase("Building corpus from workbook");
        build_corpus_from_sources(config)
    })?;

    // Reports for bulletins late on `to` may land on the following day.
    let archive_end = to
        .and_time(NaiveTime::MIN)
        .checked_add_signed(chrono::TimeDelta::days(1) + window)
        .map_or(NaiveDate::MAX, |end| end.date());
    progress.phase("Scanning archive");
    let archive = ArchiveScanner::new(archive_config).preload(from, archive_end);

    progress.phase("Matching");
    let generated = corpus
        .range(from.and_time(NaiveTime::MIN)..)
        .take_while(|(ts, _)| ts.date() <= to)
        .count();
    let pairs = matcher::match_corpus(&corpus, &archive, from, to, window);

    let report = MatchReport {
        generated,
        archive_reports: archive.len(),
        pairs,
        elapsed: start.elapsed(),
    };
    info!(
        generated = report.generated,
        archive = report.archive_reports,
        pairs = report.pairs.len(),
        "match complete"
    );
    progress.done(&format!(
        "{} pairs from {} bulletins",
        report.pairs.len(),
        report.generated
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use bulletin_shared::parse_reference_time;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bc-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn make_config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.sources.workbook = root.join("missing.xlsx");
        config.sources.archive_root = root.join("archive");
        config.cache.path = root.join("cache").join("bulletins.json");
        config
    }

    #[test]
    fn missing_workbook_fails_without_writing_cache() {
        let tmp = temp_dir();
        let config = make_config(&tmp);
        assert!(build_cache(&config, true, &SilentProgress).is_err());
        assert!(!config.cache.path.exists());
        assert!(bulletin_at(&config, parse_reference_time("2023-04-19 18:30:00").unwrap()).is_err());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn match_uses_cached_corpus_and_archive() {
        let tmp = temp_dir();
        let config = make_config(&tmp);

        let mut corpus = CorpusMap::new();
        corpus.insert(
            parse_reference_time("2023-04-19 18:30:00").unwrap(),
            "Zastoj na AC.".to_string(),
        );
        CacheStore::new(&config.cache.path).save(&corpus).unwrap();
        write(
            &tmp,
            "archive/Promet 2023/April 2023/a.txt",
            "19. 4. 2023 18.40\nPodatki o prometu.\nZastoj na AC.\n".as_bytes(),
        );

        let from = NaiveDate::from_ymd_opt(2023, 4, 19).unwrap();
        let report = run_match(&config, from, from, &SilentProgress).unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(report.archive_reports, 1);
        assert_eq!(report.pairs.len(), 1);
        assert!((report.pairs[0].score - 1.0).abs() < 1e-9);

        let hit = archive_at(&config, parse_reference_time("2023-04-19 18:30:00").unwrap())
            .unwrap()
            .expect("hit");
        assert_eq!(hit.body, "Zastoj na AC.");
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_windows_are_config_errors() {
        let tmp = temp_dir();
        let mut config = make_config(&tmp);
        config.archive.match_window_minutes = -5;
        let day = NaiveDate::from_ymd_opt(2023, 4, 19).unwrap();
        let at = parse_reference_time("2023-04-19 18:30:00").unwrap();
        assert!(matches!(
            run_match(&config, day, day, &SilentProgress),
            Err(CorpusError::Config { .. })
        ));
        assert!(archive_at(&config, at).is_err());

        let mut config = make_config(&tmp);
        config.selection.lookback_minutes = 9_000_000_000_000_000;
        assert!(matches!(bulletin_at(&config, at), Err(CorpusError::Config { .. })));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let tmp = temp_dir();
        let config = make_config(&tmp);
        let from = NaiveDate::from_ymd_opt(2023, 4, 20).unwrap();
        let to = NaiveDate::from_ymd_opt(2023, 4, 19).unwrap();
        assert!(run_match(&config, from, to, &SilentProgress).is_err());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
