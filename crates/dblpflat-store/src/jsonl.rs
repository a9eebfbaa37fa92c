//! JSON lines sink: one object per row.

use std::io::Write;

use dblpflat_core::{Column, EntityKind, Table};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{check_write_args, CellMode, Sink, StoreError};

/// Writes each row as a JSON object on its own line.
///
/// Keys appear as `"table"`, `"kind"`, then the table columns in layout
/// order, so the same table always serializes to the same bytes.
/// [`CellMode::First`] writes a string or null per cell, [`CellMode::Json`]
/// an array of strings.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    cells: CellMode,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, cells: CellMode) -> Self {
        Self { writer, cells }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

struct RowRecord<'a> {
    table: &'a str,
    kind: EntityKind,
    columns: &'a [Column],
    cells: &'a [Vec<String>],
    mode: CellMode,
}

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 2))?;
        map.serialize_entry("table", self.table)?;
        map.serialize_entry("kind", &self.kind)?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            match self.mode {
                CellMode::First => map.serialize_entry(column.name(), &cell.first())?,
                CellMode::Json => map.serialize_entry(column.name(), cell)?,
            }
        }
        map.end()
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn write_table(
        &mut self,
        table_name: &str,
        table: &Table,
        batch_size: usize,
    ) -> Result<usize, StoreError> {
        check_write_args(table_name, batch_size)?;

        let mut written = 0;
        for chunk in table.rows().chunks(batch_size) {
            for row in chunk {
                let record = RowRecord {
                    table: table_name,
                    kind: row.kind,
                    columns: table.columns(),
                    cells: &row.cells,
                    mode: self.cells,
                };
                serde_json::to_writer(&mut self.writer, &record)?;
                self.writer.write_all(b"\n")?;
            }
            self.writer.flush()?;
            written += chunk.len();
        }

        tracing::info!(table = table_name, rows = written, "table written");
        Ok(written)
    }
}
