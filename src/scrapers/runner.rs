use std::io::Write;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tempfile::{Builder, TempPath};
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::fetch::{Location, fetch_bytes};

const DEFAULT_SCRIPT_SUFFIX: &str = ".py";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Completed,
    DownloadFailed,
    ExecutionFailed,
}

/// Result of one script, as recorded in the run report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptOutcome {
    pub location: String,
    pub status: ScriptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Run every script in order, isolating failures.
///
/// # Arguments
///
/// * `locations` - Script URLs or local paths, run in this order
/// * `interpreter` - Program each staged script is passed to
/// * `work_dir` - Current directory of every child process
///
/// # Returns
///
/// One [`ScriptOutcome`] per location, in input order. A failed script never
/// stops the ones after it.
#[instrument(level = "info", skip_all, fields(count = locations.len(), interpreter = %interpreter))]
pub async fn run_scripts(locations: &[String], interpreter: &str, work_dir: &Path) -> Vec<ScriptOutcome> {
    info!("=== Batch script execution started ===");
    let mut outcomes = Vec::with_capacity(locations.len());

    for raw in locations {
        let t0 = Instant::now();
        let result = run_script(&Location::parse(raw), interpreter, work_dir).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        let (status, err) = match result {
            Ok(()) => {
                info!(location = %raw, elapsed_ms, "✅ Completed");
                (ScriptStatus::Completed, None)
            }
            Err(e @ Error::Download { .. }) => {
                error!(location = %raw, error = %e, "❌ Download failed");
                (ScriptStatus::DownloadFailed, Some(e.to_string()))
            }
            Err(e) => {
                error!(location = %raw, error = %e, "❌ Execution failed");
                (ScriptStatus::ExecutionFailed, Some(e.to_string()))
            }
        };
        outcomes.push(ScriptOutcome {
            location: raw.clone(),
            status,
            error: err,
            elapsed_ms,
        });
    }

    let completed = outcomes
        .iter()
        .filter(|o| o.status == ScriptStatus::Completed)
        .count();
    info!(
        completed,
        failed = outcomes.len() - completed,
        "=== Batch script execution completed ==="
    );
    outcomes
}

/// Fetch one script, stage it in a temporary file and run it to completion.
///
/// # Errors
///
/// [`Error::Download`] if the script cannot be retrieved, [`Error::Execution`]
/// if it cannot be staged, spawned, or exits unsuccessfully.
#[instrument(level = "info", skip(interpreter, work_dir), fields(location = %location))]
pub async fn run_script(location: &Location, interpreter: &str, work_dir: &Path) -> Result<()> {
    info!("📥 Downloading script");
    let bytes = fetch_bytes(location).await?;

    let script = stage_script(location, &bytes)
        .map_err(|e| Error::execution(location.to_string(), e))?;

    info!(path = %script.display(), "🚀 Running script");
    let status = Command::new(interpreter)
        .arg(&*script)
        .current_dir(work_dir)
        .status()
        .await;

    let path_for_log = script.display().to_string();
    if let Err(e) = script.close() {
        warn!(path = %path_for_log, error = %e, "Failed to remove temporary script");
    }

    let status = status.map_err(|e| Error::execution(location.to_string(), e))?;
    if !status.success() {
        return Err(Error::execution(location.to_string(), format!("process exited with {status}")));
    }
    Ok(())
}

/// Write the script to a temp file that is deleted when the returned guard drops.
fn stage_script(location: &Location, bytes: &[u8]) -> std::io::Result<TempPath> {
    let suffix = location
        .extension()
        .unwrap_or_else(|| DEFAULT_SCRIPT_SUFFIX.to_string());
    let mut file = Builder::new().prefix("scraper-").suffix(&suffix).tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}
