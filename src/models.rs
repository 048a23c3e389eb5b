//! Tabular data model shared by every stage.
//!
//! - [`Value`]: a single cell (text, number or explicit null)
//! - [`Table`]: ordered column names plus rows aligned to them
//!
//! Nulls are first-class: a [`Value::Null`] must survive every storage format
//! the pipeline writes, so it is never collapsed into an empty string or zero.

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

/// Provenance column appended to every merged row.
pub const SOURCE_FILE_COLUMN: &str = "Source_File";

/// Unique key used when comparing against the reference list.
pub const ARTICLE_URL_COLUMN: &str = "Article URL";

/// Columns carried from the diff into the exported document, in order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Title", "Summary", "Date", ARTICLE_URL_COLUMN, SOURCE_FILE_COLUMN];

/// Marker written in place of a null cell in spreadsheet and delimited files.
pub const DEFAULT_NULL_MARKER: &str = "NULL";

/// Text a null renders as in the exported document.
pub const NULL_DISPLAY: &str = "None";

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
}

impl Value {
    /// Parse a field read from a delimited file, keeping its text verbatim.
    ///
    /// Only the exact null marker becomes [`Value::Null`]; the empty string stays
    /// empty text.
    pub fn from_field(field: &str, null_marker: &str) -> Self {
        if field == null_marker {
            Value::Null
        } else {
            Value::Text(field.to_string())
        }
    }

    /// Like [`Value::from_field`], but fields that parse as finite numbers
    /// become numbers. Lossy for text such as `"1.10"` or `"007"`.
    pub fn infer_field(field: &str, null_marker: &str) -> Self {
        match Value::from_field(field, null_marker) {
            Value::Text(t) => match t.parse::<f64>() {
                Ok(n) if n.is_finite() && !t.trim().is_empty() && t.trim() == t => {
                    Value::Number(n)
                }
                _ => Value::Text(t),
            },
            other => other,
        }
    }

    /// Render for a delimited or spreadsheet cell, writing nulls as the marker.
    pub fn to_field(&self, null_marker: &str) -> String {
        match self {
            Value::Null => null_marker.to_string(),
            other => other.to_string(),
        }
    }

    /// Key form used for set membership. Nulls have no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string().trim().to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_DISPLAY),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// Integral floats print without a fractional part (`3` rather than `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// An in-memory table: column names and rows aligned with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Push a row, padding with nulls or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Cell lookup by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Append a column with the same value in every row.
    pub fn add_constant_column(&mut self, name: &str, value: Value) {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = value.clone();
            }
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    /// Concatenate tables, unioning their columns in first-seen order.
    ///
    /// A column missing from one input is null for that input's rows.
    pub fn concat(tables: Vec<Table>) -> Table {
        let columns: Vec<String> = tables
            .iter()
            .flat_map(|t| t.columns.iter().cloned())
            .unique()
            .collect();
        let mut combined = Table::new(columns);

        for table in tables {
            let mapping: Vec<Option<usize>> = combined
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect();
            for row in table.rows {
                let aligned = mapping
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect();
                combined.rows.push(aligned);
            }
        }
        combined
    }

    /// Project onto `(output, source)` column pairs.
    ///
    /// Each output column takes its values from `source`; a source this table
    /// lacks is synthesized as an all-null column.
    pub fn select_mapped(&self, columns: &[(&str, &str)]) -> Table {
        let mapping: Vec<Option<usize>> = columns
            .iter()
            .map(|(_, source)| self.column_index(source))
            .collect();
        let mut out = Table::new(columns.iter().map(|(name, _)| name.to_string()).collect());
        for row in &self.rows {
            out.rows.push(
                mapping
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect(),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for r in rows {
            t.push_row(r);
        }
        t
    }

    #[test]
    fn test_from_field_null_marker_only() {
        assert_eq!(Value::from_field("NULL", "NULL"), Value::Null);
        assert_eq!(Value::from_field("", "NULL"), Value::Text(String::new()));
        assert_eq!(Value::from_field("null", "NULL"), Value::Text("null".into()));
        assert_eq!(Value::from_field("007", "NULL"), Value::Text("007".into()));
        assert_eq!(Value::from_field("1.10", "NULL"), Value::Text("1.10".into()));
    }

    #[test]
    fn test_infer_field_numbers() {
        assert_eq!(Value::infer_field("NULL", "NULL"), Value::Null);
        assert_eq!(Value::infer_field("42", "NULL"), Value::Number(42.0));
        assert_eq!(Value::infer_field(" 42", "NULL"), Value::Text(" 42".into()));
        assert_eq!(Value::infer_field("NaN", "NULL"), Value::Text("NaN".into()));
        assert_eq!(Value::infer_field("", "NULL"), Value::Text(String::new()));
    }

    #[test]
    fn test_to_field_and_display() {
        assert_eq!(Value::Null.to_field("NULL"), "NULL");
        assert_eq!(Value::Null.to_string(), "None");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::from("x").to_field("NULL"), "x");
    }

    #[test]
    fn test_as_key_trims_and_skips_null() {
        assert_eq!(Value::from(" https://a ").as_key(), Some("https://a".into()));
        assert_eq!(Value::Null.as_key(), None);
    }

    #[test]
    fn test_concat_unions_columns_and_fills_nulls() {
        let a = table(&["Title", "Date"], vec![vec!["a".into(), "d1".into()]]);
        let b = table(
            &["Title", "Summary"],
            vec![vec!["b".into(), "s".into()], vec!["c".into(), Value::Null]],
        );
        let c = Table::concat(vec![a, b]);

        assert_eq!(c.columns, vec!["Title", "Date", "Summary"]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.get(0, "Summary"), Some(&Value::Null));
        assert_eq!(c.get(1, "Date"), Some(&Value::Null));
        assert_eq!(c.get(1, "Summary"), Some(&Value::from("s")));
    }

    #[test]
    fn test_select_mapped_synthesizes_missing() {
        let t = table(&["Title", "Article URL"], vec![vec!["a".into(), "u".into()]]);
        let pairs: Vec<(&str, &str)> = REQUIRED_COLUMNS.iter().map(|&c| (c, c)).collect();
        let projected = t.select_mapped(&pairs);
        assert_eq!(projected.columns, REQUIRED_COLUMNS.to_vec());
        assert_eq!(projected.get(0, "Title"), Some(&Value::from("a")));
        assert_eq!(projected.get(0, "Summary"), Some(&Value::Null));
        assert_eq!(projected.get(0, "Source_File"), Some(&Value::Null));
    }

    #[test]
    fn test_select_mapped_renames_source_column() {
        let t = table(&["Title", "Link"], vec![vec!["a".into(), "https://a".into()]]);
        let projected = t.select_mapped(&[("Title", "Title"), ("Article URL", "Link"), ("Date", "Date")]);
        assert_eq!(projected.columns, vec!["Title", "Article URL", "Date"]);
        assert_eq!(projected.get(0, "Article URL"), Some(&Value::from("https://a")));
        assert_eq!(projected.get(0, "Date"), Some(&Value::Null));
    }

    #[test]
    fn test_add_constant_column() {
        let mut t = table(&["Title"], vec![vec!["a".into()], vec!["b".into()]]);
        t.add_constant_column(SOURCE_FILE_COLUMN, "x.xlsx".into());
        assert_eq!(t.columns, vec!["Title", "Source_File"]);
        assert!(t.rows.iter().all(|r| r[1] == Value::from("x.xlsx")));
    }
}
