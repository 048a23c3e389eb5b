//! # News Merge
//!
//! A batch orchestrator for news scrapers. It runs a fixed list of remote
//! scraper scripts, merges the spreadsheets they leave behind, keeps durable
//! copies of the merged table, and reports which articles are missing from a
//! published reference list.
//!
//! ## Usage
//!
//! ```sh
//! news_merge --work-dir ./news --reference-url https://example.org/published.csv
//! ```
//!
//! ## Architecture
//!
//! The application is a linear, one-shot pipeline:
//! 1. **Scrapers**: fetch each script and run it in the working directory
//! 2. **Merge**: combine every scraper spreadsheet into one table
//! 3. **Persist**: write delimited text and a SQLite table
//! 4. **Diff**: find rows whose article URL is not in the reference list
//! 5. **Export**: render those rows as a DOCX document with hyperlinks
//!
//! Failures are logged to the run log and never change the exit code.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod diff;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod tables;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let loaded = PipelineConfig::from_cli(&args);

    // Log path comes from the config when it loaded, otherwise from the CLI alone.
    let log_path = match &loaded {
        Ok(config) => config.log_path(),
        Err(_) => {
            let fallback = PipelineConfig {
                work_dir: args.work_dir.clone().unwrap_or_else(|| ".".into()),
                ..PipelineConfig::default()
            };
            match &args.log_file {
                Some(log) => fallback.artifact(&log.to_string_lossy()),
                None => fallback.log_path(),
            }
        }
    };
    init_tracing(&log_path);

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_merge starting up");

    match loaded {
        Ok(config) => {
            if let Err(e) = ensure_writable_dir(&config.work_dir).await {
                error!(
                    path = %config.work_dir.display(),
                    error = %e,
                    "Working directory is not writable (fix perms or choose a different path)"
                );
            } else {
                let report = pipeline::run(&config).await;
                info!(
                    scripts = report.scripts.len(),
                    combined_rows = report.combined_rows,
                    unmatched_rows = report.unmatched_rows,
                    "Run summary"
                );
            }
        }
        Err(e) => error!(error = %e, "Failed to load configuration; nothing was run"),
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), millis = elapsed.subsec_millis(), "Execution complete");

    println!(
        "✅ Batch run finished. Check '{}' for details.",
        log_path.display()
    );
}

/// Send all tracing output to the append-only run log.
///
/// Falls back to stdout when the log file cannot be opened.
fn init_tracing(log_path: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let writer = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(e) => {
            eprintln!("cannot open log file {}: {e}; logging to stdout", log_path.display());
            BoxMakeWriter::new(std::io::stdout)
        }
    };

    tfmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}
