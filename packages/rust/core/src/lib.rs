//! Core pipeline orchestration and domain logic for the bulletin corpus.
//!
//! This crate ties together snapshot selection, archive scanning, the
//! persisted corpus, and archive matching into end-to-end workflows.

pub mod corpus;
pub mod matcher;
pub mod pipeline;

pub use corpus::{build_corpus, load_or_build};
pub use matcher::{TermVector, match_corpus, rank_and_dedup, text_similarity, tokenize, write_matches};
pub use pipeline::{
    MatchReport, ProgressReporter, SilentProgress, archive_at, build_cache,
    build_corpus_from_sources, bulletin_at, run_match,
};
