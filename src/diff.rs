//! Compare the local export against the published reference list.
//!
//! A local row is *unmatched* when its article URL does not appear anywhere in
//! the reference URL column. Membership is by set lookup, so duplicates on
//! either side behave predictably: every local occurrence of a URL is kept or
//! dropped together, and original row order is preserved.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::fetch::{Location, fetch_bytes};
use crate::models::{ARTICLE_URL_COLUMN, REQUIRED_COLUMNS, Table};
use crate::tables::delimited::{ReadOptions, read_delimited, read_delimited_file};
use crate::tables::sheet::write_sheet;

/// Summary of a diff run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    pub local_rows: usize,
    pub reference_rows: usize,
    /// Reference records dropped as malformed.
    pub reference_skipped: usize,
    pub unmatched: usize,
    /// Unmatched spreadsheet, written only when `unmatched > 0`.
    pub output: Option<PathBuf>,
}

/// Rows of `local` whose `key` value is not among `reference`'s keys.
///
/// Null and blank keys never match. The result keeps all of `local`'s columns.
///
/// # Errors
///
/// [`Error::Schema`] if either table lacks the key column.
pub fn unmatched_rows(local: &Table, reference: &Table, key: &str) -> Result<Table> {
    let local_idx = local
        .column_index(key)
        .ok_or_else(|| Error::schema("local table", key))?;
    let ref_idx = reference
        .column_index(key)
        .ok_or_else(|| Error::schema("reference table", key))?;

    let known: HashSet<String> = reference
        .rows
        .iter()
        .filter_map(|row| row.get(ref_idx).and_then(|v| v.as_key()))
        .filter(|k| !k.is_empty())
        .collect();

    let mut out = Table::new(local.columns.clone());
    out.rows = local
        .rows
        .iter()
        .filter(|row| {
            match row.get(local_idx).and_then(|v| v.as_key()) {
                Some(k) if !k.is_empty() => !known.contains(&k),
                _ => true,
            }
        })
        .cloned()
        .collect();
    Ok(out)
}

/// Load both sides, diff them, and write the unmatched spreadsheet.
///
/// The unmatched spreadsheet and document left over from an earlier run are
/// removed first, so an empty difference leaves neither behind.
///
/// # Arguments
///
/// * `config` - Supplies the working directory, artifact names, delimiters,
///   null marker, key column and reference location
///
/// # Returns
///
/// A [`DiffOutcome`] with row counts. `output` is `Some` only when unmatched
/// rows were written.
///
/// # Errors
///
/// - [`Error::Download`] if the reference location is unset or unreachable
/// - [`Error::Schema`] if either side lacks the key column
/// - I/O and delimited-text errors from reading the local export
#[instrument(level = "info", skip_all)]
pub async fn diff_against_reference(config: &PipelineConfig) -> Result<DiffOutcome> {
    let output = config.artifact(&config.artifacts.unmatched_sheet);
    let document = config.artifact(&config.artifacts.document);
    for stale in [&output, &document] {
        if stale.exists() {
            std::fs::remove_file(stale)?;
            debug!(path = %stale.display(), "Removed output of an earlier run");
        }
    }

    let local = read_delimited_file(
        &config.artifact(&config.artifacts.combined_csv),
        &ReadOptions {
            delimiter: config.local_delimiter_byte(),
            null_marker: &config.null_marker,
            skip_malformed: false,
            infer_numbers: false,
        },
    )?
    .table;

    let raw_location = config
        .reference_url
        .as_deref()
        .ok_or_else(|| Error::download("<unset>", "no reference location configured"))?;
    let location = Location::parse(raw_location);
    let bytes = fetch_bytes(&location).await?;
    let reference = read_delimited(
        bytes.as_slice(),
        &ReadOptions {
            delimiter: config.reference_delimiter_byte(),
            null_marker: &config.null_marker,
            skip_malformed: true,
            infer_numbers: false,
        },
    )?;
    if reference.skipped > 0 {
        warn!(skipped = reference.skipped, "Skipped malformed reference lines");
    }
    info!(
        reference = %location,
        local_rows = local.len(),
        reference_rows = reference.table.len(),
        "Loaded diff inputs"
    );

    let unmatched = unmatched_rows(&local, &reference.table, &config.key_column)?;
    let mut outcome = DiffOutcome {
        local_rows: local.len(),
        reference_rows: reference.table.len(),
        reference_skipped: reference.skipped,
        unmatched: unmatched.len(),
        output: None,
    };

    if unmatched.is_empty() {
        info!("No new articles: every local URL is already in the reference list");
        return Ok(outcome);
    }

    let projected = unmatched.select_mapped(&required_projection(&config.key_column));
    write_sheet(&output, &projected, &config.null_marker)?;
    info!(path = %output.display(), rows = projected.len(), "Wrote unmatched articles");
    outcome.output = Some(output);
    Ok(outcome)
}

/// Output columns paired with their source column. The configured key column
/// always lands under the fixed `Article URL` name the exporter reads.
fn required_projection(key: &str) -> Vec<(&'static str, &str)> {
    REQUIRED_COLUMNS
        .iter()
        .map(|&c| (c, if c == ARTICLE_URL_COLUMN { key } else { c }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlushPoll;
    use crate::models::Value;
    use crate::tables::delimited::write_delimited;
    use crate::tables::sheet::{NullConvention, read_sheet};
    use std::path::Path;

    fn urls(column: &str, values: &[&str]) -> Table {
        let mut t = Table::new(vec!["Title".into(), column.into()]);
        for (i, v) in values.iter().enumerate() {
            t.push_row(vec![Value::Text(format!("t{i}")), Value::from(*v)]);
        }
        t
    }

    fn titles(t: &Table) -> Vec<String> {
        (0..t.len()).map(|i| t.get(i, "Title").unwrap().to_string()).collect()
    }

    fn config_with_reference(dir: &Path, reference: &str) -> PipelineConfig {
        let ref_path = dir.join("reference.csv");
        std::fs::write(&ref_path, reference).unwrap();
        PipelineConfig {
            work_dir: dir.to_path_buf(),
            reference_url: Some(ref_path.to_string_lossy().into_owned()),
            flush_poll: FlushPoll {
                attempts: 1,
                min_delay_ms: 1,
                max_delay_ms: 1,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_duplicates_excluded_together_when_known() {
        let local = urls("Article URL", &["u1", "u2", "u1", "u3"]);
        let reference = urls("Article URL", &["u1"]);
        let out = unmatched_rows(&local, &reference, "Article URL").unwrap();
        assert_eq!(titles(&out), vec!["t1", "t3"]);
    }

    #[test]
    fn test_duplicates_kept_together_in_order_when_unknown() {
        let local = urls("Article URL", &["u2", "u1", "u2"]);
        let reference = urls("Article URL", &["zzz"]);
        let out = unmatched_rows(&local, &reference, "Article URL").unwrap();
        assert_eq!(titles(&out), vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_membership_not_positional() {
        let local = urls("Article URL", &["a", "b", "c"]);
        let reference = urls("Article URL", &["c", "b", "a"]);
        assert!(unmatched_rows(&local, &reference, "Article URL").unwrap().is_empty());
    }

    #[test]
    fn test_null_key_never_matches() {
        let mut local = urls("Article URL", &["a"]);
        local.push_row(vec!["t1".into(), Value::Null]);
        let reference = urls("Article URL", &["a"]);
        let out = unmatched_rows(&local, &reference, "Article URL").unwrap();
        assert_eq!(titles(&out), vec!["t1"]);
    }

    #[test]
    fn test_missing_key_column_is_schema_error() {
        let local = urls("Article URL", &["a"]);
        let reference = urls("Link", &["a"]);
        let err = unmatched_rows(&local, &reference, "Article URL").unwrap_err();
        assert!(matches!(err, Error::Schema { ref table, .. } if table == "reference table"));

        let err = unmatched_rows(&reference, &local, "Article URL").unwrap_err();
        assert!(matches!(err, Error::Schema { ref table, .. } if table == "local table"));
    }

    #[tokio::test]
    async fn test_writes_required_subset_with_synthesized_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_reference(
            dir.path(),
            "Title;Article URL\nknown;https://known\nbroken;line;with;too;many\n",
        );
        let local = urls("Article URL", &["https://known", "https://new"]);
        write_delimited(&config.artifact(&config.artifacts.combined_csv), &local, b',', "NULL").unwrap();

        let outcome = diff_against_reference(&config).await.unwrap();
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.reference_rows, 1);
        assert_eq!(outcome.reference_skipped, 1);

        let out = read_sheet(
            outcome.output.as_deref().unwrap(),
            &NullConvention::Marker("NULL".into()),
        )
        .unwrap();
        assert_eq!(out.columns, REQUIRED_COLUMNS.to_vec());
        assert_eq!(out.get(0, "Article URL"), Some(&Value::from("https://new")));
        assert_eq!(out.get(0, "Summary"), Some(&Value::Null));
        assert_eq!(out.get(0, "Source_File"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_custom_key_column_written_as_article_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_reference(dir.path(), "Title;Link\nknown;https://known\n");
        config.key_column = "Link".to_string();
        let local = urls("Link", &["https://known", "https://new"]);
        write_delimited(&config.artifact(&config.artifacts.combined_csv), &local, b',', "NULL").unwrap();

        let outcome = diff_against_reference(&config).await.unwrap();
        assert_eq!(outcome.unmatched, 1);

        let out = read_sheet(
            outcome.output.as_deref().unwrap(),
            &NullConvention::Marker("NULL".into()),
        )
        .unwrap();
        assert_eq!(out.columns, REQUIRED_COLUMNS.to_vec());
        assert_eq!(out.get(0, "Article URL"), Some(&Value::from("https://new")));
    }

    #[tokio::test]
    async fn test_empty_difference_writes_nothing_and_clears_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_reference(dir.path(), "Article URL\nhttps://a\n");
        let local = urls("Article URL", &["https://a"]);
        write_delimited(&config.artifact(&config.artifacts.combined_csv), &local, b',', "NULL").unwrap();
        let stale = config.artifact(&config.artifacts.unmatched_sheet);
        std::fs::write(&stale, b"old").unwrap();
        let stale_doc = config.artifact(&config.artifacts.document);
        std::fs::write(&stale_doc, b"old").unwrap();

        let outcome = diff_against_reference(&config).await.unwrap();
        assert_eq!(outcome.unmatched, 0);
        assert!(outcome.output.is_none());
        assert!(!stale.exists());
        assert!(!stale_doc.exists());
    }

    #[tokio::test]
    async fn test_reference_without_key_is_schema_error_and_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_reference(dir.path(), "Title;Link\nx;https://a\n");
        let local = urls("Article URL", &["https://a"]);
        write_delimited(&config.artifact(&config.artifacts.combined_csv), &local, b',', "NULL").unwrap();

        let err = diff_against_reference(&config).await.unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(!config.artifact(&config.artifacts.unmatched_sheet).exists());
    }

    #[tokio::test]
    async fn test_unset_reference_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            work_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let local = urls("Article URL", &["https://a"]);
        write_delimited(&config.artifact(&config.artifacts.combined_csv), &local, b',', "NULL").unwrap();
        let err = diff_against_reference(&config).await.unwrap_err();
        assert_eq!(err.kind(), "download");
    }
}
