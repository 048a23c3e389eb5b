//! Utility functions for logging, path handling and file system checks.
//!
//! - String truncation for log fields
//! - Base-name extraction for provenance tagging
//! - Writable-directory validation for the working directory
//! - Best-effort polling for a freshly written file

use std::path::Path;
use std::time::Duration;

use rand::{Rng, rng};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::config::FlushPoll;
use crate::error::Result;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Base name of a path as an owned string (`"dir/a.xlsx"` → `"a.xlsx"`).
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Arguments
///
/// * `path` - The working directory to validate
///
/// # Returns
///
/// `Ok(())` if the directory exists and is writable.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Working directory is writable");
    Ok(())
}

/// Poll until `path` exists and is non-empty.
///
/// Sleeps a random delay between `min_delay_ms` and `max_delay_ms` between
/// polls.
///
/// # Arguments
///
/// * `path` - File expected to appear
/// * `poll` - Attempt count and delay bounds
///
/// # Returns
///
/// `true` if the file was seen within the allowed attempts. Callers read the
/// file either way.
#[instrument(level = "debug", skip(poll), fields(path = %path.display()))]
pub async fn wait_for_file(path: &Path, poll: &FlushPoll) -> bool {
    for attempt in 1..=poll.attempts {
        match fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {
                debug!(attempt, "File is ready");
                return true;
            }
            _ => {}
        }
        if attempt == poll.attempts {
            break;
        }
        let (lo, hi) = if poll.min_delay_ms <= poll.max_delay_ms {
            (poll.min_delay_ms, poll.max_delay_ms)
        } else {
            (poll.max_delay_ms, poll.min_delay_ms)
        };
        let delay = Duration::from_millis(rng().random_range(lo..=hi));
        debug!(attempt, ?delay, "File not ready yet; waiting");
        tokio::time::sleep(delay).await;
    }
    warn!(attempts = poll.attempts, "File still not visible after polling");
    false
}
