//! Spreadsheet (xlsx) reading and writing.
//!
//! Reads use `calamine` and always take the first worksheet with the first row
//! as the header. Writes use `rust_xlsxwriter` with a bold header row.
//!
//! Two null conventions exist because the inputs differ:
//! - scraper output: an empty cell is null
//! - our own artifacts: only the null marker string is null, an empty cell is
//!   empty text

use std::collections::HashSet;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Table, Value, format_number};

/// Longest string Excel accepts in a single cell.
const MAX_CELL_CHARS: usize = 32_767;

/// How null cells are recognized when reading a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NullConvention {
    /// Empty cells are null (third-party scraper output).
    EmptyIsNull,
    /// Only cells holding exactly this marker are null.
    Marker(String),
}

/// Load the first worksheet of `path` into a [`Table`].
///
/// A sheet without a header row yields an empty table with no columns.
#[instrument(level = "debug", skip(nulls), fields(path = %path.display()))]
pub fn read_sheet(path: &Path, nulls: &NullConvention) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::load(path, "workbook has no worksheets"))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        debug!(sheet = %sheet_name, "Sheet is empty");
        return Ok(Table::default());
    };

    let mut table = Table::new(header_names(header_row));
    for row in rows {
        table.push_row(row.iter().map(|c| cell_value(c, nulls)).collect());
    }
    debug!(sheet = %sheet_name, rows = table.len(), columns = table.columns.len(), "Read sheet");
    Ok(table)
}

/// Write `table` as a single-sheet workbook, nulls as `null_marker`.
#[instrument(level = "debug", skip(table), fields(path = %path.display(), rows = table.len()))]
pub fn write_sheet(path: &Path, table: &Table, null_marker: &str) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        for (col, name) in table.columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &header_format)?;
        }

        let mut row_idx: u32 = 1;
        for row in &table.rows {
            for (col, value) in row.iter().enumerate() {
                let col = col as u16;
                match value {
                    Value::Null => {
                        sheet.write_string(row_idx, col, null_marker)?;
                    }
                    Value::Text(s) => {
                        sheet.write_string(row_idx, col, clamp_cell(s, row_idx))?;
                    }
                    Value::Number(n) if n.is_finite() => {
                        sheet.write_number(row_idx, col, *n)?;
                    }
                    Value::Number(n) => {
                        sheet.write_string(row_idx, col, format_number(*n))?;
                    }
                }
            }
            row_idx += 1;
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Header cells as column names; blanks become `Unnamed: <idx>` and repeats
/// get the first free `.N` suffix so every name is unique.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let raw = match cell {
                Data::Empty => String::new(),
                Data::Float(f) => format_number(*f),
                Data::Int(i) => i.to_string(),
                other => other.to_string(),
            };
            let base = match raw.trim() {
                "" => format!("Unnamed: {idx}"),
                trimmed => trimmed.to_string(),
            };
            let mut name = base.clone();
            let mut n = 1;
            while !used.insert(name.clone()) {
                name = format!("{base}.{n}");
                n += 1;
            }
            name
        })
        .collect()
}

fn cell_value(cell: &Data, nulls: &NullConvention) -> Value {
    match cell {
        Data::Empty => match nulls {
            NullConvention::EmptyIsNull => Value::Null,
            NullConvention::Marker(_) => Value::Text(String::new()),
        },
        Data::String(s) => match nulls {
            NullConvention::Marker(m) if s == m => Value::Null,
            NullConvention::EmptyIsNull if s.is_empty() => Value::Null,
            _ => Value::Text(s.clone()),
        },
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::Text(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => Value::Text(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

fn clamp_cell(s: &str, row: u32) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(row, chars = s.chars().count(), "Cell text exceeds spreadsheet limit; truncating");
            &s[..cut]
        }
        None => s,
    }
}
