//! Collect scraper spreadsheets from the working directory and merge them.
//!
//! Each file is loaded on its own: a file that fails to load is logged and
//! skipped, the rest still merge. Every row is tagged with the base name of
//! the file it came from.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{SOURCE_FILE_COLUMN, Table, Value};
use crate::tables::sheet::{NullConvention, read_sheet, write_sheet};
use crate::utils::base_name;

static SPREADSHEET_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.xlsx?$").expect("spreadsheet extension regex"));

/// What the merge step saw and produced.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub table: Table,
    pub loaded: Vec<String>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// List spreadsheet files in `dir`, sorted by name.
///
/// `excluded` names (our own artifacts) and Office lock files (`~$...`) are
/// left out.
pub fn find_spreadsheets(dir: &Path, excluded: &[&str]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("~$") || excluded.contains(&name.as_str()) {
            continue;
        }
        if SPREADSHEET_EXT.is_match(&name) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Load one scraper spreadsheet and tag its rows with the file name.
pub fn load_source(path: &Path) -> Result<Table> {
    let mut table =
        read_sheet(path, &NullConvention::EmptyIsNull).map_err(|e| Error::load(path, e))?;
    table.add_constant_column(SOURCE_FILE_COLUMN, Value::Text(base_name(path)));
    Ok(table)
}

/// Load every file in `paths` and concatenate them, column-unioned.
///
/// # Errors
///
/// [`Error::EmptyResult`] when `paths` is empty or the merged table has no
/// rows. Per-file failures are not errors; they are reported in
/// [`MergeOutcome::failed`].
#[instrument(level = "info", skip_all, fields(files = paths.len()))]
pub fn merge_files(paths: &[PathBuf]) -> Result<MergeOutcome> {
    if paths.is_empty() {
        return Err(Error::EmptyResult("no spreadsheet files found".to_string()));
    }

    let mut tables = Vec::with_capacity(paths.len());
    let mut outcome = MergeOutcome::default();
    for path in paths {
        match load_source(path) {
            Ok(table) => {
                info!(file = %base_name(path), rows = table.len(), columns = table.columns.len(), "Loaded spreadsheet");
                outcome.loaded.push(base_name(path));
                tables.push(table);
            }
            Err(e) => {
                error!(file = %base_name(path), error = %e, "Failed to load spreadsheet; skipping");
                outcome.failed.push(FailedFile {
                    file: base_name(path),
                    error: e.to_string(),
                });
            }
        }
    }

    outcome.table = Table::concat(tables);
    if outcome.table.is_empty() {
        return Err(Error::EmptyResult(format!(
            "merged table has no rows ({} loaded, {} failed)",
            outcome.loaded.len(),
            outcome.failed.len()
        )));
    }
    Ok(outcome)
}

/// Collect, merge and write the combined spreadsheet.
///
/// # Arguments
///
/// * `dir` - Working directory scanned for scraper spreadsheets
/// * `output` - Path of the combined spreadsheet to write
/// * `excluded` - File names never treated as scraper output
/// * `null_marker` - Text written in place of null cells
///
/// # Returns
///
/// The [`MergeOutcome`], including files that failed to load.
///
/// # Errors
///
/// [`Error::EmptyResult`] when there is nothing to merge, plus directory and
/// spreadsheet write errors.
#[instrument(level = "info", skip(excluded), fields(dir = %dir.display(), output = %output.display()))]
pub fn collect_and_merge(
    dir: &Path,
    output: &Path,
    excluded: &[&str],
    null_marker: &str,
) -> Result<MergeOutcome> {
    let paths = find_spreadsheets(dir, excluded)?;
    if paths.is_empty() {
        warn!("No spreadsheet files found in working directory");
    }
    let outcome = merge_files(&paths)?;
    write_sheet(output, &outcome.table, null_marker)?;
    info!(
        rows = outcome.table.len(),
        columns = outcome.table.columns.len(),
        loaded = outcome.loaded.len(),
        failed = outcome.failed.len(),
        "Wrote combined spreadsheet"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(dir: &Path, name: &str, columns: &[&str], rows: usize) {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for i in 0..rows {
            t.push_row(columns.iter().map(|c| Value::Text(format!("{c}-{name}-{i}"))).collect());
        }
        write_sheet(&dir.join(name), &t, "NULL").unwrap();
    }

    #[test]
    fn test_find_spreadsheets_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsx", "a.XLSX", "combined_news.xlsx", "~$a.xlsx", "notes.csv", "old.xls"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("dir.xlsx")).unwrap();

        let found = find_spreadsheets(dir.path(), &["combined_news.xlsx"]).unwrap();
        let names: Vec<String> = found.iter().map(|p| base_name(p)).collect();
        assert_eq!(names, vec!["a.XLSX", "b.xlsx", "old.xls"]);
    }

    #[test]
    fn test_merge_row_count_and_column_union() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "one.xlsx", &["Title", "Date"], 3);
        write_source(dir.path(), "two.xlsx", &["Title", "Summary"], 2);
        write_source(dir.path(), "three.xlsx", &["Link"], 4);

        let paths = find_spreadsheets(dir.path(), &[]).unwrap();
        let outcome = merge_files(&paths).unwrap();

        assert_eq!(outcome.table.len(), 3 + 2 + 4);
        let mut cols = outcome.table.columns.clone();
        cols.sort();
        assert_eq!(cols, vec!["Date", "Link", "Source_File", "Summary", "Title"]);
        assert!(outcome.failed.is_empty());

        // rows from a file lacking a column get nulls, and carry their file name
        let link_rows: Vec<usize> = (0..outcome.table.len())
            .filter(|&i| outcome.table.get(i, "Source_File") == Some(&Value::from("three.xlsx")))
            .collect();
        assert_eq!(link_rows.len(), 4);
        for i in link_rows {
            assert_eq!(outcome.table.get(i, "Title"), Some(&Value::Null));
        }
    }

    #[test]
    fn test_bad_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "good.xlsx", &["Title"], 2);
        std::fs::write(dir.path().join("broken.xlsx"), b"garbage").unwrap();

        let paths = find_spreadsheets(dir.path(), &[]).unwrap();
        let outcome = merge_files(&paths).unwrap();
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.loaded, vec!["good.xlsx"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].file, "broken.xlsx");
    }

    #[test]
    fn test_no_files_is_empty_result() {
        let err = merge_files(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyResult(_)));
    }

    #[test]
    fn test_all_sources_empty_is_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "empty.xlsx", &["Title"], 0);
        let paths = find_spreadsheets(dir.path(), &[]).unwrap();
        assert!(matches!(merge_files(&paths), Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_collect_and_merge_writes_output_excluded_next_time() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "one.xlsx", &["Title"], 1);
        let output = dir.path().join("combined_news.xlsx");

        collect_and_merge(dir.path(), &output, &["combined_news.xlsx"], "NULL").unwrap();
        assert!(output.exists());

        // second run must not merge its own output
        let again = collect_and_merge(dir.path(), &output, &["combined_news.xlsx"], "NULL").unwrap();
        assert_eq!(again.table.len(), 1);
    }
}
