//! SQLite sink.

use std::path::Path;

use dblpflat_core::{Column, Table};
use rusqlite::{params_from_iter, Connection};

use crate::{check_write_args, CellMode, Sink, StoreError};

/// Writes tables into a SQLite database, one TEXT column per table column.
///
/// Tables with a key column get a unique index on it and rows are inserted
/// with `INSERT OR IGNORE`, so loading the same extraction twice leaves the
/// table unchanged. An empty key cell is stored as NULL in every cell mode;
/// NULL keys never conflict, so rows without a key are always appended.
pub struct SqliteSink {
    conn: Connection,
    cells: CellMode,
}

impl SqliteSink {
    /// Open (or create) the database at `path`.
    /// Sets WAL mode and NORMAL synchronous for bulk loading.
    pub fn open(path: &Path, cells: CellMode) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        tracing::debug!(path = %path.display(), "opened SQLite sink");
        Ok(Self { conn, cells })
    }

    pub fn open_in_memory(cells: CellMode) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            cells,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_table(&self, table_name: &str, columns: &[Column]) -> Result<(), StoreError> {
        let table = quote_ident(table_name);
        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c.name())))
            .collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({});",
            column_defs.join(", ")
        ))?;

        if columns.contains(&Column::Key) {
            let index = quote_ident(&format!("idx_{table_name}_key"));
            self.conn.execute_batch(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {table} ({});",
                quote_ident(Column::Key.name())
            ))?;
        }
        Ok(())
    }

    fn insert_sql(table_name: &str, columns: &[Column]) -> String {
        let verb = if columns.contains(&Column::Key) {
            "INSERT OR IGNORE"
        } else {
            "INSERT"
        };
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c.name())).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "{verb} INTO {} ({}) VALUES ({})",
            quote_ident(table_name),
            names.join(", "),
            placeholders.join(", ")
        )
    }
}

impl Sink for SqliteSink {
    fn write_table(
        &mut self,
        table_name: &str,
        table: &Table,
        batch_size: usize,
    ) -> Result<usize, StoreError> {
        check_write_args(table_name, batch_size)?;
        if table.columns().is_empty() {
            tracing::warn!(table = table_name, "table has no columns, nothing to write");
            return Ok(0);
        }

        self.ensure_table(table_name, table.columns())?;
        let sql = Self::insert_sql(table_name, table.columns());

        let mut written = 0;
        for (chunk_index, chunk) in table.rows().chunks(batch_size).enumerate() {
            let tx = self.conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare_cached(&sql)?;
                for row in chunk {
                    let values = table
                        .columns()
                        .iter()
                        .zip(&row.cells)
                        .map(|(column, cell)| match column {
                            Column::Key if cell.is_empty() => Ok(None),
                            _ => self.cells.render(cell),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    written += stmt.execute(params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            tracing::debug!(
                table = table_name,
                chunk = chunk_index,
                rows = chunk.len(),
                "committed chunk"
            );
        }

        tracing::info!(table = table_name, rows = written, "table written");
        Ok(written)
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
