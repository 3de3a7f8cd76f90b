//! Pairing generated bulletins with the archive reports broadcast after them.
//!
//! Scoring uses hashed term-frequency vectors: each text becomes a sparse,
//! L2-normalized vector over 2^18 FNV-1a buckets and the score is their dot
//! product (cosine similarity). This stays linear in text length, which
//! matters when thousands of pairs are scored.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{debug, info, warn};

use bulletin_shared::{ArchiveMap, CorpusError, CorpusMap, MatchedPair, Result};

/// Number of hash buckets (2^18).
const BUCKETS: u32 = 1 << 18;
const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

// ---------------------------------------------------------------------------
// Term vectors
// ---------------------------------------------------------------------------

/// Lowercase alphanumeric runs of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn bucket(token: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in token.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash & (BUCKETS - 1)
}

/// Sparse L2-normalized term-frequency vector, sorted by bucket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermVector {
    entries: Vec<(u32, f64)>,
}

impl TermVector {
    pub fn from_text(text: &str) -> Self {
        let mut counts: HashMap<u32, f64> = HashMap::new();
        for token in tokenize(text) {
            *counts.entry(bucket(&token)).or_default() += 1.0;
        }

        let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Self::default();
        }

        let mut entries: Vec<(u32, f64)> = counts.into_iter().map(|(b, v)| (b, v / norm)).collect();
        entries.sort_unstable_by_key(|(b, _)| *b);
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dot product; equals cosine similarity since both sides are unit length.
    pub fn dot(&self, other: &TermVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (a, x) = self.entries[i];
            let (b, y) = other.entries[j];
            match a.cmp(&b) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += x * y;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum.clamp(0.0, 1.0)
    }
}

/// Cosine similarity of two texts in `[0, 1]`; 0 when either has no tokens.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    TermVector::from_text(a).dot(&TermVector::from_text(b))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Match every corpus bulletin generated on `from..=to` against `archive`.
///
/// A bulletin at `t` pairs with the earliest archive report in
/// `[t, t + window]`. Pairs are ranked by score, highest first, and only the
/// best pair per distinct archive text is kept. A negative `window` matches
/// nothing.
pub fn match_corpus(
    corpus: &CorpusMap,
    archive: &ArchiveMap,
    from: NaiveDate,
    to: NaiveDate,
    window: TimeDelta,
) -> Vec<MatchedPair> {
    if from > to {
        return Vec::new();
    }
    if window < TimeDelta::zero() {
        warn!(minutes = window.num_minutes(), "negative match window, nothing to match");
        return Vec::new();
    }
    let start = from.and_time(NaiveTime::MIN);
    let generated = corpus
        .range(start..)
        .take_while(|(ts, _)| ts.date() <= to);

    let mut archive_vectors: HashMap<NaiveDateTime, TermVector> = HashMap::new();
    let mut candidates = Vec::new();
    for (&timestamp, generated_text) in generated {
        let end = timestamp
            .checked_add_signed(window)
            .unwrap_or(NaiveDateTime::MAX);
        let Some((&archive_timestamp, archive_text)) = archive.range(timestamp..=end).next()
        else {
            continue;
        };

        let archive_vector = archive_vectors
            .entry(archive_timestamp)
            .or_insert_with(|| TermVector::from_text(archive_text));
        let score = TermVector::from_text(generated_text).dot(archive_vector);

        candidates.push(MatchedPair {
            timestamp,
            archive_timestamp,
            generated_text: generated_text.clone(),
            archive_text: archive_text.clone(),
            score,
        });
    }

    let total = candidates.len();
    let ranked = rank_and_dedup(candidates);
    info!(candidates = total, kept = ranked.len(), "corpus matched");
    ranked
}

/// Sort by score descending (stable) and keep the first pair per archive text.
pub fn rank_and_dedup(mut pairs: Vec<MatchedPair>) -> Vec<MatchedPair> {
    pairs.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen: HashSet<String> = HashSet::new();
    pairs.retain(|p| seen.insert(p.archive_text.clone()));
    debug!(kept = pairs.len(), "duplicate archive matches dropped");
    pairs
}

/// Write `pairs` as a pretty JSON array, atomically.
pub fn write_matches(path: &Path, pairs: &[MatchedPair]) -> Result<()> {
    let json = serde_json::to_vec_pretty(pairs)
        .map_err(|e| CorpusError::Storage(format!("failed to serialize matches: {e}")))?;
    bulletin_storage::write_atomic(path, &json)
}
