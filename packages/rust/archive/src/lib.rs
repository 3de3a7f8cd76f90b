//! Dated archive of published traffic reports.
//!
//! The archive root holds one `Promet <year>` folder per year and one
//! localized `<Month> <year>` folder per month below it. Each month folder
//! holds report documents whose text embeds `D. M. YYYY H.MM` timestamps.

pub mod convert;
pub mod extract;
pub mod months;

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use bulletin_shared::{ArchiveConfig, ArchiveDocument, ArchiveMap, Result};

pub use convert::{convert_document, docx_to_text, rtf_to_text};
pub use extract::{clean_body, find_occurrences, find_timestamps};
pub use months::{month_folder, month_name, year_folder};

/// Result of a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHit {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub body: String,
}

/// Reads report documents out of the archive tree.
pub struct ArchiveScanner {
    config: ArchiveConfig,
}

impl ArchiveScanner {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Month folder for `year`/`month`, or `None` when it does not exist.
    ///
    /// Folder names are compared case-insensitively.
    pub fn month_dir(&self, year: i32, month: u32) -> Option<PathBuf> {
        let folder = month_folder(year, month, &self.config.month_locale)?;
        let year_dir = find_child_dir(&self.config.root, &year_folder(year))?;
        find_child_dir(&year_dir, &folder)
    }

    /// Document files of one month, sorted by file name.
    pub fn month_files(&self, year: i32, month: u32) -> Vec<PathBuf> {
        let Some(dir) = self.month_dir(year, month) else {
            debug!(year, month, "no month folder");
            return Vec::new();
        };

        WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    /// Convert one file and extract its occurrences.
    ///
    /// `Ok(None)` for files whose extension is not configured.
    pub fn read_document(&self, path: &Path) -> Result<Option<ArchiveDocument>> {
        let Some(text) = convert_document(path, &self.config.extensions)? else {
            return Ok(None);
        };
        let occurrences = find_occurrences(&text, &self.config.marker);
        Ok(Some(ArchiveDocument {
            path: path.to_path_buf(),
            occurrences,
        }))
    }

    /// Documents of one month in file-name order. Files that fail to convert
    /// are logged and skipped.
    #[instrument(skip(self))]
    pub fn scan_month(&self, year: i32, month: u32) -> Vec<ArchiveDocument> {
        self.month_files(year, month)
            .iter()
            .filter_map(|path| self.read_isolated(path))
            .collect()
    }

    fn read_isolated(&self, path: &Path) -> Option<ArchiveDocument> {
        match self.read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document");
                None
            }
        }
    }

    /// First report whose timestamp lies in `[at, at + match_window]`.
    ///
    /// Documents are visited in folder then file-name order and scanning
    /// stops at the first hit. A negative match window is a config error.
    #[instrument(skip(self))]
    pub fn point_lookup(&self, at: NaiveDateTime) -> Result<Option<ArchiveHit>> {
        self.config.validate()?;
        let end = at
            .checked_add_signed(self.config.match_window)
            .unwrap_or(NaiveDateTime::MAX);
        let mut months = vec![(at.year(), at.month())];
        if (end.year(), end.month()) != months[0] {
            months.push((end.year(), end.month()));
        }

        for (year, month) in months {
            for path in self.month_files(year, month) {
                let Some(doc) = self.read_isolated(&path) else {
                    continue;
                };
                if let Some(hit) = doc
                    .occurrences
                    .into_iter()
                    .find(|o| o.timestamp >= at && o.timestamp <= end)
                {
                    debug!(path = %path.display(), timestamp = %hit.timestamp, "archive hit");
                    return Ok(Some(ArchiveHit {
                        path,
                        timestamp: hit.timestamp,
                        body: hit.body,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Every report found in the month folders touched by `from..=to`.
    ///
    /// Later occurrences of an identical timestamp overwrite earlier ones.
    #[instrument(skip(self))]
    pub fn preload(&self, from: NaiveDate, to: NaiveDate) -> ArchiveMap {
        let mut map = ArchiveMap::new();
        let mut documents = 0usize;
        for (year, month) in months_between(from, to) {
            for doc in self.scan_month(year, month) {
                documents += 1;
                for occurrence in doc.occurrences {
                    map.insert(occurrence.timestamp, occurrence.body);
                }
            }
        }
        info!(documents, reports = map.len(), "archive preloaded");
        map
    }
}

/// `(year, month)` pairs from `from`'s month through `to`'s month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<(i32, u32)> {
    let mut out = Vec::new();
    let (mut year, mut month) = (from.year(), from.month());
    while (year, month) <= (to.year(), to.month()) {
        out.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    out
}

fn find_child_dir(parent: &Path, name: &str) -> Option<PathBuf> {
    let exact = parent.join(name);
    if exact.is_dir() {
        return Some(exact);
    }
    let wanted = name.to_lowercase();
    std::fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .find(|e| {
            e.path().is_dir() && e.file_name().to_string_lossy().to_lowercase() == wanted
        })
        .map(|e| e.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulletin_shared::AppConfig;
    use chrono::TimeDelta;

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bc-archive-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn scanner(root: &Path) -> ArchiveScanner {
        let mut config = ArchiveConfig::try_from(&AppConfig::default()).expect("valid");
        config.root = root.to_path_buf();
        ArchiveScanner::new(config)
    }

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn fixture() -> PathBuf {
        let root = temp_root();
        write(
            &root,
            "Promet 2023/April 2023/a.txt",
            "19. 4. 2023   18.40\nPodatki o prometu.\n\nZastoj na AC.\n".as_bytes(),
        );
        write(
            &root,
            "Promet 2023/April 2023/b.docx",
            &convert::build_test_docx(&[
                "20. 4. 2023 7.05",
                "Podatki o prometu.",
                "Megla na Vrhniki.",
                "19. 4. 2023 18.40",
                "Podatki o prometu.",
                "Zastoj na AC pri Kozarjah.",
            ]),
        );
        write(&root, "Promet 2023/April 2023/c.docx", b"not a zip");
        write(&root, "Promet 2023/April 2023/d.pdf", b"%PDF");
        write(
            &root,
            "Promet 2023/maj 2023/a.txt",
            "1. 5. 2023 0.05\nPodatki o prometu.\nPoledica.\n".as_bytes(),
        );
        root
    }

    #[test]
    fn missing_month_folder_is_empty() {
        let root = fixture();
        let s = scanner(&root);
        assert!(s.month_dir(2023, 6).is_none());
        assert!(s.scan_month(2023, 6).is_empty());
        assert!(s.scan_month(1999, 1).is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn folder_lookup_is_case_insensitive() {
        let root = fixture();
        let s = scanner(&root);
        assert!(s.month_dir(2023, 5).is_some());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn scan_skips_bad_and_unsupported_files() {
        let root = fixture();
        let docs = scanner(&root).scan_month(2023, 4);
        let names: Vec<_> = docs
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.docx"]);
        assert_eq!(docs[1].occurrences.len(), 2);
        assert_eq!(docs[1].occurrences[0].body, "Megla na Vrhniki.");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn point_lookup_returns_first_hit_in_scan_order() {
        let root = fixture();
        let hit = scanner(&root).point_lookup(ts("2023-04-19 18:30")).unwrap().expect("hit");
        assert_eq!(hit.path.file_name().unwrap(), "a.txt");
        assert_eq!(hit.timestamp, ts("2023-04-19 18:40"));
        assert_eq!(hit.body, "Zastoj na AC.");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn point_lookup_window_is_inclusive_and_bounded() {
        let root = fixture();
        let s = scanner(&root);
        assert!(s.point_lookup(ts("2023-04-19 18:25")).unwrap().is_some());
        assert!(s.point_lookup(ts("2023-04-19 18:24")).unwrap().is_none());
        assert!(s.point_lookup(ts("2023-04-19 18:41")).unwrap().is_none());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn point_lookup_crosses_month_boundary() {
        let root = fixture();
        let hit = scanner(&root).point_lookup(ts("2023-04-30 23:55")).unwrap().expect("hit");
        assert_eq!(hit.body, "Poledica.");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn preload_later_occurrence_overwrites() {
        let root = fixture();
        let map = scanner(&root).preload(
            NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 31).unwrap(),
        );
        assert_eq!(map.len(), 3);
        assert_eq!(map[&ts("2023-04-19 18:40")], "Zastoj na AC pri Kozarjah.");
        assert_eq!(map[&ts("2023-05-01 00:05")], "Poledica.");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn months_between_spans_years() {
        let got = months_between(
            NaiveDate::from_ymd_opt(2023, 11, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        assert_eq!(got, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]);
        let backwards = months_between(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
        );
        assert!(backwards.is_empty());
    }

    #[test]
    fn custom_window() {
        let root = fixture();
        let mut s = scanner(&root);
        s.config.match_window = TimeDelta::minutes(60);
        assert!(s.point_lookup(ts("2023-04-19 17:45")).unwrap().is_some());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn negative_window_is_a_config_error() {
        let root = fixture();
        let mut s = scanner(&root);
        s.config.match_window = TimeDelta::minutes(-5);
        assert!(s.point_lookup(ts("2023-04-19 18:30")).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }
}
