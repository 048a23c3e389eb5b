//! Delimited text (CSV-style) reading and writing.
//!
//! The local export and the published reference list use different field
//! delimiters, so both directions take the delimiter explicitly. Nulls are
//! written as the null marker and only the exact marker reads back as null.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Table, Value};
use crate::utils::truncate_for_log;

/// Options for [`read_delimited`].
#[derive(Debug, Clone)]
pub struct ReadOptions<'a> {
    pub delimiter: u8,
    pub null_marker: &'a str,
    /// Skip malformed records instead of failing the whole load.
    pub skip_malformed: bool,
    /// Turn numeric-looking fields into numbers. Off keeps every field as
    /// the exact text that was written.
    pub infer_numbers: bool,
}

/// Result of a delimited read: the table and how many records were dropped.
#[derive(Debug, Clone, Default)]
pub struct DelimitedRead {
    pub table: Table,
    pub skipped: usize,
}

/// Write `table` to `path` with a header line.
#[instrument(level = "debug", skip(table), fields(path = %path.display(), rows = table.len()))]
pub fn write_delimited(path: &Path, table: &Table, delimiter: u8, null_marker: &str) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|v| v.to_field(null_marker)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read delimited text from any reader.
///
/// Header names are trimmed and a leading UTF-8 BOM is dropped. A record with
/// fewer fields than the header is padded with nulls. A record with more
/// fields, or one that fails to decode, is malformed: skipped when
/// `skip_malformed` is set, an error otherwise.
#[instrument(level = "debug", skip_all, fields(delimiter = %(opts.delimiter as char)))]
pub fn read_delimited<R: Read>(reader: R, opts: &ReadOptions<'_>) -> Result<DelimitedRead> {
    let mut reader = ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = header_names(reader.headers()?);
    let width = columns.len();
    let mut out = DelimitedRead {
        table: Table::new(columns),
        skipped: 0,
    };

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) if opts.skip_malformed => {
                warn!(record = idx + 1, error = %e, "Skipping undecodable record");
                out.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if opts.skip_malformed {
                warn!(
                    line,
                    expected = width,
                    found = record.len(),
                    preview = %truncate_for_log(&record.iter().collect::<Vec<_>>().join("|"), 120),
                    "Skipping malformed record"
                );
                out.skipped += 1;
                continue;
            }
            return Err(Error::Csv(csv::Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {line}: expected {width} fields, found {}", record.len()),
            ))));
        }

        out.table.push_row(
            record
                .iter()
                .map(|field| {
                    if opts.infer_numbers {
                        Value::infer_field(field, opts.null_marker)
                    } else {
                        Value::from_field(field, opts.null_marker)
                    }
                })
                .collect(),
        );
    }

    debug!(rows = out.table.len(), skipped = out.skipped, "Read delimited text");
    Ok(out)
}

/// Convenience wrapper reading from a file path.
pub fn read_delimited_file(path: &Path, opts: &ReadOptions<'_>) -> Result<DelimitedRead> {
    let file = std::fs::File::open(path)?;
    read_delimited(file, opts)
}

fn header_names(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = if idx == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(delimiter: u8, skip_malformed: bool) -> ReadOptions<'static> {
        ReadOptions {
            delimiter,
            null_marker: "NULL",
            skip_malformed,
            infer_numbers: false,
        }
    }

    #[test]
    fn test_write_then_read_keeps_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut t = Table::new(vec!["Title".into(), "Summary".into(), "Count".into()]);
        t.push_row(vec!["a, with comma".into(), Value::Null, Value::Number(4.0)]);
        t.push_row(vec!["b".into(), Value::Text(String::new()), Value::Null]);
        write_delimited(&path, &t, b',', "NULL").unwrap();

        let back = read_delimited_file(
            &path,
            &ReadOptions {
                infer_numbers: true,
                ..opts(b',', false)
            },
        )
        .unwrap();
        assert_eq!(back.skipped, 0);
        assert_eq!(back.table, t);
    }

    #[test]
    fn test_numeric_looking_text_kept_verbatim() {
        let data = "Title,Code,Score\nA,007,1.10\n";
        let read = read_delimited(data.as_bytes(), &opts(b',', false)).unwrap();
        assert_eq!(read.table.get(0, "Code"), Some(&Value::from("007")));
        assert_eq!(read.table.get(0, "Score"), Some(&Value::from("1.10")));
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let data = "Title;Article URL\nA;https://a\nB;https://b;extra;fields\nC;https://c\n";
        let read = read_delimited(data.as_bytes(), &opts(b';', true)).unwrap();
        assert_eq!(read.skipped, 1);
        assert_eq!(read.table.len(), 2);
        assert_eq!(read.table.get(1, "Article URL"), Some(&Value::from("https://c")));
    }

    #[test]
    fn test_malformed_line_fails_when_strict() {
        let data = "a,b\n1,2,3\n";
        assert!(read_delimited(data.as_bytes(), &opts(b',', false)).is_err());
    }

    #[test]
    fn test_short_record_padded_with_null() {
        let data = "Title;Article URL;Date\nA;https://a\n";
        let read = read_delimited(data.as_bytes(), &opts(b';', true)).unwrap();
        assert_eq!(read.skipped, 0);
        assert_eq!(read.table.get(0, "Date"), Some(&Value::Null));
    }

    #[test]
    fn test_header_bom_and_whitespace_stripped() {
        let data = "\u{feff}Title ; Article URL \nA;https://a\n";
        let read = read_delimited(data.as_bytes(), &opts(b';', true)).unwrap();
        assert_eq!(read.table.columns, vec!["Title", "Article URL"]);
    }
}
