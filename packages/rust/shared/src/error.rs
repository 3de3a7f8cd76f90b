//! Error types for the bulletin corpus.
//!
//! Library crates use [`CorpusError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all corpus operations.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Markup, timestamp, or XML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Structural problem in the tabular workbook.
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Requested year sheet is not present in the workbook.
    #[error("sheet '{sheet}' not found in workbook")]
    SheetNotFound { sheet: String },

    /// An archive document could not be converted to plain text.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Persisted cache read/write error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (checksum mismatch, invalid threshold, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CorpusError>;

impl CorpusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CorpusError::config("missing workbook path");
        assert_eq!(err.to_string(), "config error: missing workbook path");

        let err = CorpusError::SheetNotFound {
            sheet: "2021".into(),
        };
        assert!(err.to_string().contains("'2021'"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = CorpusError::io(
            "/nope/cache.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("cache.json"));
    }
}
