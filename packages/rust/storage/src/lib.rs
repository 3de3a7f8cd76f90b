//! Persistent store for the precomputed bulletin corpus.
//!
//! The corpus is written as a single JSON envelope:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "created_at": "2024-05-01T10:00:00Z",
//!   "entry_count": 2,
//!   "sha256": "…",
//!   "entries": [{ "timestamp": "2024-01-01T08:00:00", "text": "…" }]
//! }
//! ```
//!
//! `sha256` covers the serialized `entries` array. Any mismatch between the
//! envelope header and its entries makes the file unusable.
//!
//! **Access rules:** one process writes the file at a time. Writes go to a
//! hidden temp file in the same directory and are renamed into place, so a
//! reader never sees a half-written cache.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bulletin_shared::{BulletinText, CorpusError, CorpusMap, Result};

/// Envelope layout version; bump when the on-disk shape changes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    schema_version: u32,
    created_at: DateTime<Utc>,
    entry_count: usize,
    sha256: String,
    entries: Vec<BulletinText>,
}

/// Summary of a written cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    pub path: PathBuf,
    pub entry_count: usize,
    pub sha256: String,
}

/// File-backed corpus cache.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cached corpus.
    ///
    /// `Ok(None)` when no cache file exists. A file that cannot be parsed,
    /// or whose header disagrees with its entries, is an error.
    pub fn load(&self) -> Result<Option<CorpusMap>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CorpusError::io(&self.path, e)),
        };

        let envelope: CacheEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| CorpusError::Storage(format!("malformed cache file: {e}")))?;

        if envelope.schema_version != SCHEMA_VERSION {
            return Err(CorpusError::Storage(format!(
                "cache schema v{} is not supported (expected v{SCHEMA_VERSION})",
                envelope.schema_version
            )));
        }
        if envelope.entry_count != envelope.entries.len() {
            return Err(CorpusError::Storage(format!(
                "cache header lists {} entries, file holds {}",
                envelope.entry_count,
                envelope.entries.len()
            )));
        }
        let actual = checksum(&envelope.entries)?;
        if actual != envelope.sha256 {
            return Err(CorpusError::Storage("cache checksum mismatch".into()));
        }

        let map: CorpusMap = envelope
            .entries
            .into_iter()
            .map(|e| (e.timestamp, e.text))
            .collect();
        if map.len() != envelope.entry_count {
            return Err(CorpusError::Storage(
                "cache contains duplicate timestamps".into(),
            ));
        }

        tracing::debug!(path = %self.path.display(), entries = map.len(), "cache loaded");
        Ok(Some(map))
    }

    /// Replace the cache file with `corpus`.
    pub fn save(&self, corpus: &CorpusMap) -> Result<CacheManifest> {
        let entries: Vec<BulletinText> = corpus
            .iter()
            .map(|(timestamp, text)| BulletinText {
                timestamp: *timestamp,
                text: text.clone(),
            })
            .collect();
        let sha256 = checksum(&entries)?;
        let envelope = CacheEnvelope {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            entry_count: entries.len(),
            sha256: sha256.clone(),
            entries,
        };

        let json = serde_json::to_vec(&envelope)
            .map_err(|e| CorpusError::Storage(format!("failed to serialize cache: {e}")))?;
        write_atomic(&self.path, &json)?;

        tracing::info!(
            path = %self.path.display(),
            entries = envelope.entry_count,
            "cache written"
        );
        Ok(CacheManifest {
            path: self.path.clone(),
            entry_count: envelope.entry_count,
            sha256,
        })
    }
}

fn checksum(entries: &[BulletinText]) -> Result<String> {
    let bytes = serde_json::to_vec(entries)
        .map_err(|e| CorpusError::Storage(format!("failed to serialize entries: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `bytes` to `path` through a hidden `.<name>.tmp` sibling and rename.
///
/// Creates the parent directory when missing. The temp file is removed when
/// the write or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| CorpusError::io(&parent, e))?;

    let name = path
        .file_name()
        .ok_or_else(|| CorpusError::validation(format!("{} has no file name", path.display())))?
        .to_string_lossy();
    let temp = parent.join(format!(".{name}.tmp"));

    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(CorpusError::io(&temp, e));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(CorpusError::io(path, e));
    }
    Ok(())
}
