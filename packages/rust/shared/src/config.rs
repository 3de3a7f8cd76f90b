//! Application configuration for the bulletin corpus.
//!
//! User config lives at `~/.bulletin-corpus/bulletin-corpus.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bulletin-corpus.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bulletin-corpus";

// ---------------------------------------------------------------------------
// Config structs (matching bulletin-corpus.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input locations and column layout.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Window selection parameters.
    #[serde(default)]
    pub selection: SelectionSettings,

    /// Archive scanning parameters.
    #[serde(default)]
    pub archive: ArchiveSettings,

    /// Persisted corpus cache.
    #[serde(default)]
    pub cache: CacheSettings,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Path to the tabular snapshot workbook (one sheet per year).
    #[serde(default = "default_workbook")]
    pub workbook: PathBuf,

    /// Root of the archive document tree.
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Year sheets to load when building the full corpus.
    #[serde(default = "default_years")]
    pub years: Vec<i32>,

    /// Name of the timestamp column.
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// First fragment-column group, in concatenation order.
    #[serde(default = "default_primary_columns")]
    pub primary_columns: Vec<String>,

    /// Second fragment-column group. Reserved: rows keep these cells, but
    /// selection and corpus building combine only `primary_columns`.
    #[serde(default = "default_secondary_columns")]
    pub secondary_columns: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            workbook: default_workbook(),
            archive_root: default_archive_root(),
            years: default_years(),
            timestamp_column: default_timestamp_column(),
            primary_columns: default_primary_columns(),
            secondary_columns: default_secondary_columns(),
        }
    }
}

fn default_workbook() -> PathBuf {
    PathBuf::from("Data/RTVSlo/Podatki - PrometnoPorocilo_2022_2023_2024.xlsx")
}
fn default_archive_root() -> PathBuf {
    PathBuf::from("Data/RTVSlo")
}
fn default_years() -> Vec<i32> {
    vec![2022, 2023, 2024]
}
fn default_timestamp_column() -> String {
    "Datum".into()
}
fn default_primary_columns() -> Vec<String> {
    vec!["A1".into(), "B1".into(), "C1".into()]
}
fn default_secondary_columns() -> Vec<String> {
    vec!["A2".into(), "B2".into(), "C2".into()]
}

/// `[selection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Lookback window W in minutes.
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,

    /// Near-duplicate threshold τ in (0, 1).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            lookback_minutes: default_lookback_minutes(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_lookback_minutes() -> i64 {
    15
}
fn default_similarity_threshold() -> f64 {
    0.85
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Literal that precedes the report body in a converted document.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Forward match window in minutes, `[T, T + window]`.
    #[serde(default = "default_match_window_minutes")]
    pub match_window_minutes: i64,

    /// Locale used to name month folders (e.g. `sl_SI`).
    #[serde(default = "default_month_locale")]
    pub month_locale: String,

    /// Document extensions to convert (lowercase, without dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            match_window_minutes: default_match_window_minutes(),
            month_locale: default_month_locale(),
            extensions: default_extensions(),
        }
    }
}

fn default_marker() -> String {
    "Podatki o prometu.".into()
}
fn default_match_window_minutes() -> i64 {
    15
}
fn default_month_locale() -> String {
    "sl_SI".into()
}
fn default_extensions() -> Vec<String> {
    vec!["docx".into(), "rtf".into(), "txt".into()]
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Location of the persisted timestamp → text map.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("var/cache/bulletins.json")
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime window-selection parameters.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Lookback window W; rows in `[T - W, T]` are candidates.
    pub lookback: TimeDelta,
    /// Similarity threshold τ.
    pub threshold: f64,
    /// Fragment columns to concatenate, in order.
    pub columns: Vec<String>,
}

impl TryFrom<&AppConfig> for SelectionConfig {
    type Error = CorpusError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let selection = Self {
            lookback: minutes("selection.lookback_minutes", config.selection.lookback_minutes)?,
            threshold: config.selection.similarity_threshold,
            columns: config.sources.primary_columns.clone(),
        };
        selection.validate()?;
        Ok(selection)
    }
}

impl SelectionConfig {
    /// Reject thresholds outside (0, 1) and negative windows.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(CorpusError::config(format!(
                "similarity threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.lookback < TimeDelta::zero() {
            return Err(CorpusError::config("lookback window must not be negative"));
        }
        Ok(())
    }
}

/// Largest accepted window: one year.
const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

/// Convert a configured minute count into a duration, rejecting values that
/// are negative or larger than [`MAX_WINDOW_MINUTES`].
fn minutes(key: &str, value: i64) -> Result<TimeDelta> {
    if !(0..=MAX_WINDOW_MINUTES).contains(&value) {
        return Err(CorpusError::config(format!(
            "{key} must be between 0 and {MAX_WINDOW_MINUTES}, got {value}"
        )));
    }
    TimeDelta::try_minutes(value)
        .ok_or_else(|| CorpusError::config(format!("{key} is out of range: {value}")))
}

/// Runtime archive-scanning parameters.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    pub marker: String,
    pub match_window: TimeDelta,
    pub month_locale: String,
    pub extensions: Vec<String>,
}

impl TryFrom<&AppConfig> for ArchiveConfig {
    type Error = CorpusError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let archive = Self {
            root: config.sources.archive_root.clone(),
            marker: config.archive.marker.clone(),
            match_window: minutes("archive.match_window_minutes", config.archive.match_window_minutes)?,
            month_locale: config.archive.month_locale.clone(),
            extensions: config.archive.extensions.clone(),
        };
        archive.validate()?;
        Ok(archive)
    }
}

impl ArchiveConfig {
    /// Reject a negative match window and an empty marker.
    pub fn validate(&self) -> Result<()> {
        if self.match_window < TimeDelta::zero() {
            return Err(CorpusError::config("match window must not be negative"));
        }
        if self.marker.is_empty() {
            return Err(CorpusError::config("archive marker must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bulletin-corpus/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CorpusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bulletin-corpus/bulletin-corpus.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CorpusError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CorpusError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CorpusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CorpusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
