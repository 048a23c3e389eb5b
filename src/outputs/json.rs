//! JSON run report.
//!
//! The report is rewritten after every run with the status of each stage,
//! per-script outcomes and row counts. It is the machine-readable companion
//! to the run log.

use std::path::Path;

use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::pipeline::RunReport;

/// Serialize `report` as pretty JSON to `path`.
///
/// Creates the parent directory when missing and replaces any earlier report.
///
/// # Arguments
///
/// * `report` - Outcome of the run just finished
/// * `path` - Destination file
///
/// # Returns
///
/// `Ok(())` on success, or an error if serialization, directory creation or
/// the file write fails.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, json).await?;
    info!("Wrote run report");
    Ok(())
}
