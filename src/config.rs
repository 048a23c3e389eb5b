//! Run configuration.
//!
//! Resolution order: built-in defaults, then an optional YAML file, then CLI
//! flags. Every artifact lives in the working directory under a fixed name.
//!
//! ```yaml
//! scripts:
//!   - https://raw.githubusercontent.com/MariaKlap/RI/main/HMA6news.py
//! reference_url: https://example.org/published.csv
//! reference_delimiter: ";"
//! interpreter: python3
//! artifacts:
//!   combined_sheet: combined_news.xlsx
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::models::{ARTICLE_URL_COLUMN, DEFAULT_NULL_MARKER};

/// Scrapers run when no list is configured.
pub const DEFAULT_SCRIPTS: [&str; 2] = [
    "https://raw.githubusercontent.com/MariaKlap/RI/main/CBGnewsfinal5win.py",
    "https://raw.githubusercontent.com/MariaKlap/RI/main/HMA6news.py",
];

/// File names of everything a run produces, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Artifacts {
    pub combined_sheet: String,
    pub combined_csv: String,
    pub database: String,
    pub table: String,
    pub unmatched_sheet: String,
    pub document: String,
    pub report: String,
    pub log_file: String,
}

impl Default for Artifacts {
    fn default() -> Self {
        Self {
            combined_sheet: "combined_news.xlsx".to_string(),
            combined_csv: "combined_news.csv".to_string(),
            database: "news.db".to_string(),
            table: "news".to_string(),
            unmatched_sheet: "unmatched_articles.xlsx".to_string(),
            document: "unmatched_articles.docx".to_string(),
            report: "run_report.json".to_string(),
            log_file: "batch_run_log.txt".to_string(),
        }
    }
}

/// Polling used to wait for the delimited export to become readable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlushPoll {
    pub attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for FlushPoll {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_delay_ms: 1000,
            max_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Script locations, run in order.
    pub scripts: Vec<String>,
    /// Program each script is passed to.
    pub interpreter: String,
    pub work_dir: PathBuf,
    /// Published reference list; the diff stage fails when unset.
    pub reference_url: Option<String>,
    pub reference_delimiter: char,
    pub local_delimiter: char,
    /// Column holding the unique article key on both sides of the diff.
    pub key_column: String,
    pub null_marker: String,
    pub artifacts: Artifacts,
    pub flush_poll: FlushPoll,
    #[serde(skip)]
    pub skip_scrapers: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scripts: DEFAULT_SCRIPTS.iter().map(|s| s.to_string()).collect(),
            interpreter: "python".to_string(),
            work_dir: PathBuf::from("."),
            reference_url: None,
            reference_delimiter: ';',
            local_delimiter: ',',
            key_column: ARTICLE_URL_COLUMN.to_string(),
            null_marker: DEFAULT_NULL_MARKER.to_string(),
            artifacts: Artifacts::default(),
            flush_poll: FlushPoll::default(),
            skip_scrapers: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                let parsed: PipelineConfig = serde_yaml::from_str(&raw)?;
                info!(path = %p.display(), scripts = parsed.scripts.len(), "Loaded configuration file");
                parsed
            }
            None => PipelineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration for a CLI invocation.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Self::load(cli.config.as_deref())?;
        if let Some(dir) = &cli.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(url) = &cli.reference_url {
            config.reference_url = Some(url.clone());
        }
        if let Some(interp) = &cli.interpreter {
            config.interpreter = interp.clone();
        }
        if let Some(log) = &cli.log_file {
            config.artifacts.log_file = log.to_string_lossy().into_owned();
        }
        config.skip_scrapers = cli.skip_scrapers;
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, delim) in [
            ("reference_delimiter", self.reference_delimiter),
            ("local_delimiter", self.local_delimiter),
        ] {
            if !delim.is_ascii() {
                return Err(Error::Config(format!(
                    "{name} must be a single ASCII character, got {delim:?}"
                )));
            }
        }
        if self.null_marker.is_empty() {
            return Err(Error::Config("null_marker must not be empty".to_string()));
        }
        Ok(())
    }

    /// Absolute-or-relative path of an artifact inside the working directory.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn log_path(&self) -> PathBuf {
        self.artifact(&self.artifacts.log_file)
    }

    pub fn reference_delimiter_byte(&self) -> u8 {
        self.reference_delimiter as u8
    }

    pub fn local_delimiter_byte(&self) -> u8 {
        self.local_delimiter as u8
    }
}
