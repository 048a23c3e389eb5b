//! End-to-end batch run.
//!
//! Stages run strictly in order:
//!
//! 1. scrapers: fetch and run every configured script
//! 2. merge: combine scraper spreadsheets into the combined spreadsheet
//! 3. persist: delimited export and SQLite table
//! 4. diff: compare against the reference list, write unmatched rows
//! 5. export: render unmatched rows as a document
//!
//! A stage failure is logged and marks every later stage as skipped. The run
//! itself never fails; its outcome is the [`RunReport`].

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::PipelineConfig;
use crate::diff::diff_against_reference;
use crate::error::Error;
use crate::outputs::document::export_unmatched;
use crate::outputs::json::write_report;
use crate::scrapers::{ScriptOutcome, run_scripts};
use crate::store::persist_combined;
use crate::tables::merge::{FailedFile, collect_and_merge};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// An upstream stage failed or the stage was disabled.
    Skipped,
    /// Finished without producing output because there was nothing new.
    NothingNew,
    Failed(String),
}

impl StageStatus {
    fn failed(stage: &str, e: &Error) -> Self {
        error!(stage, kind = e.kind(), error = %e, "Stage failed; skipping downstream stages");
        StageStatus::Failed(e.to_string())
    }
}

/// Everything a run did, serialized to the run report file.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: u64,
    pub scripts: Vec<ScriptOutcome>,
    pub merge: StageStatus,
    pub persist: StageStatus,
    pub diff: StageStatus,
    pub export: StageStatus,
    pub combined_rows: usize,
    pub failed_files: Vec<FailedFile>,
    pub persisted_rows: usize,
    pub csv_flushed: bool,
    pub reference_rows: usize,
    pub reference_lines_skipped: usize,
    pub unmatched_rows: usize,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: now_rfc3339(),
            finished_at: String::new(),
            elapsed_ms: 0,
            scripts: Vec::new(),
            merge: StageStatus::Skipped,
            persist: StageStatus::Skipped,
            diff: StageStatus::Skipped,
            export: StageStatus::Skipped,
            combined_rows: 0,
            failed_files: Vec::new(),
            persisted_rows: 0,
            csv_flushed: false,
            reference_rows: 0,
            reference_lines_skipped: 0,
            unmatched_rows: 0,
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run every stage and write the run report.
///
/// # Arguments
///
/// * `config` - Effective configuration for this run
///
/// # Returns
///
/// The [`RunReport`] that was also written to the working directory. Stage
/// failures are recorded in it rather than returned.
#[instrument(level = "info", skip_all, fields(work_dir = %config.work_dir.display()))]
pub async fn run(config: &PipelineConfig) -> RunReport {
    let t0 = Instant::now();
    let mut report = RunReport::new();
    info!("=== Batch run started ===");

    if config.skip_scrapers {
        info!("Scraper stage disabled; using spreadsheets already in the working directory");
    } else {
        report.scripts = run_scripts(&config.scripts, &config.interpreter, &config.work_dir).await;
    }

    run_stages(config, &mut report).await;

    report.elapsed_ms = t0.elapsed().as_millis() as u64;
    report.finished_at = now_rfc3339();
    let report_path = config.artifact(&config.artifacts.report);
    if let Err(e) = write_report(&report, &report_path).await {
        error!(path = %report_path.display(), error = %e, "Failed to write run report");
    }

    info!(
        elapsed_ms = report.elapsed_ms,
        combined_rows = report.combined_rows,
        unmatched_rows = report.unmatched_rows,
        "=== Batch run completed ==="
    );
    report
}

/// Merge → persist → diff → export, stopping at the first failure.
async fn run_stages(config: &PipelineConfig, report: &mut RunReport) {
    let combined_sheet = config.artifact(&config.artifacts.combined_sheet);
    let excluded = [
        config.artifacts.combined_sheet.as_str(),
        config.artifacts.unmatched_sheet.as_str(),
    ];

    match collect_and_merge(&config.work_dir, &combined_sheet, &excluded, &config.null_marker) {
        Ok(merged) => {
            report.combined_rows = merged.table.len();
            report.failed_files = merged.failed;
            report.merge = StageStatus::Completed;
        }
        Err(e) => {
            report.merge = StageStatus::failed("merge", &e);
            return;
        }
    }

    match persist_combined(config).await {
        Ok(persisted) => {
            info!(rows = persisted.rows, columns = persisted.columns, "Persist finished");
            report.persisted_rows = persisted.rows;
            report.csv_flushed = persisted.csv_ready;
            report.persist = StageStatus::Completed;
        }
        Err(e) => {
            report.persist = StageStatus::failed("persist", &e);
            return;
        }
    }

    match diff_against_reference(config).await {
        Ok(diff) => {
            info!(
                local_rows = diff.local_rows,
                reference_rows = diff.reference_rows,
                unmatched = diff.unmatched,
                "Diff finished"
            );
            report.reference_rows = diff.reference_rows;
            report.reference_lines_skipped = diff.reference_skipped;
            report.unmatched_rows = diff.unmatched;
            report.diff = if diff.output.is_some() {
                StageStatus::Completed
            } else {
                StageStatus::NothingNew
            };
        }
        Err(e) => {
            report.diff = StageStatus::failed("diff", &e);
            return;
        }
    }

    let unmatched_sheet = config.artifact(&config.artifacts.unmatched_sheet);
    let document = config.artifact(&config.artifacts.document);
    report.export = match export_unmatched(&unmatched_sheet, &document, &config.null_marker) {
        Ok(true) => StageStatus::Completed,
        Ok(false) => StageStatus::NothingNew,
        Err(e) => StageStatus::failed("export", &e),
    };
}
