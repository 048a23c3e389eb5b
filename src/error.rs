//! Error taxonomy for the batch pipeline.
//!
//! The domain variants mirror the stages that can fail:
//!
//! | Variant | Raised by | Effect |
//! |---------|-----------|--------|
//! | [`Error::Download`] | script fetch, reference fetch | script skipped / diff stage fails |
//! | [`Error::Execution`] | script run | script skipped |
//! | [`Error::Load`] | one source spreadsheet | that file skipped |
//! | [`Error::Schema`] | diff | diff and export skipped |
//! | [`Error::EmptyResult`] | merge, persist | all downstream stages skipped |
//!
//! None of these ever reach the process exit code; the orchestrator logs them
//! and records them in the run report.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("download failed for {location}: {reason}")]
    Download { location: String, reason: String },

    #[error("execution failed for {location}: {reason}")]
    Execution { location: String, reason: String },

    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("{table} is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("nothing to process: {0}")]
    EmptyResult(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet read error: {0}")]
    SheetRead(#[from] calamine::Error),

    #[error("spreadsheet write error: {0}")]
    SheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("document error: {0}")]
    Document(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn download(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Download {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Execution {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Short machine-friendly label used in the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::Execution { .. } => "execution",
            Self::Load { .. } => "load",
            Self::Schema { .. } => "schema",
            Self::EmptyResult(_) => "empty_result",
            Self::Io(_) => "io",
            Self::SheetRead(_) | Self::SheetWrite(_) => "spreadsheet",
            Self::Csv(_) => "csv",
            Self::Sqlx(_) => "database",
            Self::Http(_) => "http",
            Self::Json(_) | Self::Yaml(_) => "serialization",
            Self::Document(_) => "document",
            Self::Config(_) => "config",
        }
    }
}
