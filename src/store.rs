//! Durable copies of the combined table: delimited text and SQLite.
//!
//! The combined spreadsheet is reloaded with the null-marker convention, then
//! written out twice. In the delimited file nulls stay as the marker; in
//! SQLite they become real `NULL`s. The SQLite table is dropped and recreated
//! on every run, never appended to.

use std::collections::HashSet;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::models::{Table, Value};
use crate::tables::delimited::write_delimited;
use crate::tables::sheet::{NullConvention, read_sheet};
use crate::utils::wait_for_file;

/// Summary of what the persist step wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub rows: usize,
    pub columns: usize,
    /// Whether the delimited file was seen on disk before moving on.
    pub csv_ready: bool,
}

/// Reload the combined spreadsheet and write the delimited and SQLite copies.
///
/// # Arguments
///
/// * `config` - Supplies the artifact names, delimiter, null marker and the
///   flush polling used after the delimited write
///
/// # Returns
///
/// A [`PersistOutcome`] with the persisted shape and whether the delimited
/// file was seen on disk before the database write.
///
/// # Errors
///
/// [`Error::EmptyResult`] when the combined spreadsheet is missing or holds no
/// rows; write failures propagate as-is.
#[instrument(level = "info", skip_all)]
pub async fn persist_combined(config: &PipelineConfig) -> Result<PersistOutcome> {
    let sheet_path = config.artifact(&config.artifacts.combined_sheet);
    if !sheet_path.exists() {
        return Err(Error::EmptyResult(format!(
            "combined spreadsheet {} does not exist",
            sheet_path.display()
        )));
    }

    let table = read_sheet(&sheet_path, &NullConvention::Marker(config.null_marker.clone()))?;
    if table.columns.is_empty() || table.is_empty() {
        return Err(Error::EmptyResult(format!(
            "combined spreadsheet {} is empty",
            sheet_path.display()
        )));
    }

    let csv_path = config.artifact(&config.artifacts.combined_csv);
    write_delimited(&csv_path, &table, config.local_delimiter_byte(), &config.null_marker)?;
    info!(path = %csv_path.display(), rows = table.len(), "Wrote delimited export");

    let csv_ready = wait_for_file(&csv_path, &config.flush_poll).await;
    if !csv_ready {
        warn!(path = %csv_path.display(), "Delimited export not visible yet; continuing anyway");
    }

    let db_path = config.artifact(&config.artifacts.database);
    let pool = open_database(&db_path).await?;
    let written = replace_table(&pool, &config.artifacts.table, &table).await;
    pool.close().await;
    written?;
    info!(
        path = %db_path.display(),
        table = %config.artifacts.table,
        rows = table.len(),
        "Replaced database table"
    );

    Ok(PersistOutcome {
        rows: table.len(),
        columns: table.columns.len(),
        csv_ready,
    })
}

/// Open (creating if needed) a single-connection pool on a SQLite file.
pub async fn open_database(path: &Path) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    Ok(pool)
}

/// Drop `name` and recreate it from `table` inside one transaction.
///
/// Columns are declared without types so each value keeps its own storage
/// class: text as TEXT, numbers as REAL, nulls as NULL.
#[instrument(level = "debug", skip(pool, table), fields(rows = table.len()))]
pub async fn replace_table(pool: &SqlitePool, name: &str, table: &Table) -> Result<()> {
    let columns = sql_column_names(&table.columns);
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");

    let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_ident(name));
    let create_sql = format!("CREATE TABLE {} ({column_list})", quote_ident(name));
    let insert_sql = format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        quote_ident(name)
    );

    let mut tx = pool.begin().await?;
    sqlx::query(&drop_sql).execute(&mut *tx).await?;
    sqlx::query(&create_sql).execute(&mut *tx).await?;

    for row in &table.rows {
        let mut query = sqlx::query(&insert_sql);
        for value in row {
            query = match value {
                Value::Null => query.bind(Option::<String>::None),
                Value::Text(s) => query.bind(s.clone()),
                Value::Number(n) => query.bind(*n),
            };
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Read a whole table back, SQL `NULL` becoming [`Value::Null`].
#[cfg(test)]
pub(crate) async fn read_table(pool: &SqlitePool, name: &str) -> Result<Table> {
    use sqlx::{Column, Row};

    let rows = sqlx::query(&format!("SELECT * FROM {}", quote_ident(name)))
        .fetch_all(pool)
        .await?;

    let columns = match rows.first() {
        Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };
    let mut table = Table::new(columns);
    for row in &rows {
        let values = (0..row.columns().len())
            .map(|idx| sqlite_value(row, idx))
            .collect::<Result<Vec<_>>>()?;
        table.push_row(values);
    }
    Ok(table)
}

#[cfg(test)]
fn sqlite_value(row: &sqlx::sqlite::SqliteRow, idx: usize) -> Result<Value> {
    use sqlx::{Row, ValueRef};

    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Ok(Value::Number(v));
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Ok(Value::Number(v as f64));
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Ok(Value::Text(v));
    }
    let bytes: Vec<u8> = row.try_get(idx)?;
    Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

/// SQLite identifiers are case-insensitive; make column names unique under
/// that rule by suffixing later duplicates.
fn sql_column_names(columns: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    columns
        .iter()
        .map(|c| {
            let mut name = c.clone();
            let mut n = 1;
            while !seen.insert(name.to_lowercase()) {
                name = format!("{c}.{n}");
                n += 1;
            }
            name
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
