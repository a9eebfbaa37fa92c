//! Persistence for extracted tables.
//!
//! A [`Sink`] appends a finished [`Table`] in fixed-size chunks. Two sinks
//! are provided: SQLite ([`SqliteSink`]) and JSON lines
//! ([`JsonLinesSink`]).

mod jsonl;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use dblpflat_core::Table;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use jsonl::JsonLinesSink;
pub use sqlite::SqliteSink;

/// Rows per chunk unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("unknown cell mode: {0} (expected first or json)")]
    UnknownCellMode(String),
}

/// Append-only destination for extracted tables.
pub trait Sink {
    /// Write every row of `table` into `table_name`, `batch_size` rows at a
    /// time. Returns the number of rows actually written.
    fn write_table(
        &mut self,
        table_name: &str,
        table: &Table,
        batch_size: usize,
    ) -> Result<usize, StoreError>;
}

/// How a multi-valued cell is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellMode {
    /// Only the first value; null when the cell is empty.
    #[default]
    First,
    /// All values as a JSON array.
    Json,
}

impl CellMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellMode::First => "first",
            CellMode::Json => "json",
        }
    }

    /// Render a cell as a single nullable text value.
    pub fn render(&self, cell: &[String]) -> Result<Option<String>, StoreError> {
        match self {
            CellMode::First => Ok(cell.first().cloned()),
            CellMode::Json => Ok(Some(serde_json::to_string(cell)?)),
        }
    }
}

impl fmt::Display for CellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(CellMode::First),
            "json" => Ok(CellMode::Json),
            _ => Err(StoreError::UnknownCellMode(s.to_string())),
        }
    }
}

fn check_write_args(table_name: &str, batch_size: usize) -> Result<(), StoreError> {
    if batch_size == 0 {
        return Err(StoreError::InvalidBatchSize);
    }
    if table_name.trim().is_empty() {
        return Err(StoreError::EmptyTableName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_mode_render() {
        let cell = vec!["Ann".to_string(), "Bob \"B\"".to_string()];
        assert_eq!(CellMode::First.render(&cell).unwrap().as_deref(), Some("Ann"));
        assert_eq!(CellMode::First.render(&[]).unwrap(), None);
        assert_eq!(
            CellMode::Json.render(&cell).unwrap().as_deref(),
            Some(r#"["Ann","Bob \"B\""]"#)
        );
        assert_eq!(CellMode::Json.render(&[]).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_cell_mode_parse() {
        assert_eq!("first".parse::<CellMode>().unwrap(), CellMode::First);
        assert_eq!(" JSON ".parse::<CellMode>().unwrap(), CellMode::Json);
        assert!(matches!(
            "csv".parse::<CellMode>(),
            Err(StoreError::UnknownCellMode(_))
        ));
    }

    #[test]
    fn test_write_args() {
        assert!(matches!(check_write_args("t", 0), Err(StoreError::InvalidBatchSize)));
        assert!(matches!(check_write_args(" ", 10), Err(StoreError::EmptyTableName)));
        assert!(check_write_args("articles", 1).is_ok());
    }
}
