//! Shared types, error model, and configuration for the bulletin corpus.
//!
//! This crate is the foundation depended on by all other bulletin crates.
//! It provides:
//! - [`CorpusError`]: the unified error type
//! - Domain types ([`RawSnapshotRow`], [`BulletinText`], [`ArchiveDocument`], [`MatchedPair`])
//! - Configuration ([`AppConfig`], [`SelectionConfig`], [`ArchiveConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchiveConfig, ArchiveSettings, CacheSettings, SelectionConfig, SelectionSettings,
    SourcesConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CorpusError, Result};
pub use types::{
    ArchiveDocument, ArchiveMap, ArchiveOccurrence, BulletinText, CorpusMap, MatchedPair,
    RawSnapshotRow, TIMESTAMP_FORMAT, floor_to_minute, parse_reference_time,
};
