//! Record aggregation over a single walk of the document.
//!
//! Drives the [`StreamWalker`], extracts a row for every record of a
//! requested kind and releases each record as soon as it has been seen, so
//! only one record is ever held in memory.

use std::collections::BTreeSet;
use std::io::BufRead;

use crate::extractor::extract;
use crate::kinds::{Column, EntityKind, Feature};
use crate::walker::{Disposition, StreamWalker, WalkOutcome, WalkStats};
use crate::{ExtractError, RequestError};

/// Records between progress snapshots.
const PROGRESS_INTERVAL: u64 = 10_000;

/// What to extract in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    entity_types: BTreeSet<EntityKind>,
    features: Vec<Feature>,
    include_key: bool,
    max_elements: Option<u64>,
}

impl ExtractionRequest {
    /// Build a request for `entity_types`, extracting `features` in the
    /// given order. Fails on an empty kind set or a repeated feature.
    pub fn new(
        entity_types: impl IntoIterator<Item = EntityKind>,
        features: Vec<Feature>,
    ) -> Result<Self, RequestError> {
        let entity_types: BTreeSet<_> = entity_types.into_iter().collect();
        if entity_types.is_empty() {
            return Err(RequestError::NoEntityTypes);
        }
        let mut seen = BTreeSet::new();
        for feature in &features {
            if !seen.insert(*feature) {
                return Err(RequestError::DuplicateFeature(*feature));
            }
        }
        Ok(Self {
            entity_types,
            features,
            include_key: false,
            max_elements: None,
        })
    }

    /// Build a request from tag names, e.g. from a config file.
    pub fn from_names<S: AsRef<str>>(
        entity_types: &[S],
        features: &[S],
    ) -> Result<Self, RequestError> {
        let kinds = entity_types
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<EntityKind>, _>>()?;
        let features = features
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<Feature>, _>>()?;
        Self::new(kinds, features)
    }

    pub fn with_key(mut self, include_key: bool) -> Self {
        self.include_key = include_key;
        self
    }

    /// Stop the pass after this many record elements, requested or not.
    pub fn with_max_elements(mut self, max_elements: Option<u64>) -> Self {
        self.max_elements = max_elements;
        self
    }

    pub fn entity_types(&self) -> &BTreeSet<EntityKind> {
        &self.entity_types
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn include_key(&self) -> bool {
        self.include_key
    }

    pub fn max_elements(&self) -> Option<u64> {
        self.max_elements
    }

    pub fn columns(&self) -> Vec<Column> {
        Column::layout(&self.features, self.include_key)
    }
}

/// One extracted record. Each cell holds the values of one column in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub kind: EntityKind,
    pub cells: Vec<Vec<String>>,
}

/// Fixed-schema output of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of `column` in the layout.
    pub fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    /// Append a row. The row must have one cell per column.
    pub fn push(&mut self, row: Row) {
        debug_assert_eq!(row.cells.len(), self.columns.len());
        self.rows.push(row);
    }
}

/// Counters collected during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Record elements consumed, requested or not.
    pub elements_seen: u64,
    pub rows: u64,
    /// Rows where every requested feature has a value.
    pub full: u64,
    pub partial: u64,
    pub missing_keys: u64,
    /// Total number of values per column, in column order.
    pub column_counts: Vec<(Column, u64)>,
}

/// Periodic progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractProgress {
    pub elements_seen: u64,
    pub rows: u64,
    /// Bytes of (decompressed) input consumed.
    pub bytes_read: u64,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub table: Table,
    pub stats: ExtractionStats,
    pub outcome: WalkOutcome,
    pub walk: WalkStats,
}

/// Run one extraction pass over `walker`.
pub fn extract_entities<R: BufRead>(
    walker: &mut StreamWalker<R>,
    request: &ExtractionRequest,
) -> Result<Extraction, ExtractError> {
    extract_entities_with_progress(walker, request, |_| {})
}

/// Like [`extract_entities`], reporting progress every few thousand records
/// and once at the end.
pub fn extract_entities_with_progress<R: BufRead>(
    walker: &mut StreamWalker<R>,
    request: &ExtractionRequest,
    mut on_progress: impl FnMut(ExtractProgress),
) -> Result<Extraction, ExtractError> {
    let columns = request.columns();
    let mut table = Table::new(columns.clone());
    let mut stats = ExtractionStats {
        column_counts: columns.iter().map(|c| (*c, 0)).collect(),
        ..ExtractionStats::default()
    };

    tracing::info!(
        kinds = ?request.entity_types,
        features = ?request.features,
        include_key = request.include_key,
        max_elements = ?request.max_elements,
        "starting extraction pass"
    );

    let limit_reached = |seen: u64| request.max_elements.is_some_and(|max| seen >= max);

    // The walk is suspended every PROGRESS_INTERVAL records to take a
    // progress snapshot, then resumed.
    let outcome = loop {
        if limit_reached(stats.elements_seen) {
            break WalkOutcome::Stopped;
        }

        let outcome = walker.walk(|element| {
            let Some(kind) = EntityKind::from_tag(element.tag()) else {
                return Disposition::Retain;
            };
            stats.elements_seen += 1;

            if request.entity_types.contains(&kind) {
                let fields = extract(element, &request.features, request.include_key);
                if fields.missing_key() {
                    stats.missing_keys += 1;
                }
                if fields.is_full() {
                    stats.full += 1;
                } else {
                    stats.partial += 1;
                }
                for ((_, count), (_, values)) in stats.column_counts.iter_mut().zip(fields.iter()) {
                    *count += values.len() as u64;
                }
                table.push(Row {
                    kind,
                    cells: fields.into_cells(),
                });
                stats.rows += 1;
            }

            if limit_reached(stats.elements_seen)
                || stats.elements_seen % PROGRESS_INTERVAL == 0
            {
                Disposition::Stop
            } else {
                Disposition::Release
            }
        })?;

        on_progress(ExtractProgress {
            elements_seen: stats.elements_seen,
            rows: stats.rows,
            bytes_read: walker.bytes_read(),
        });

        if outcome == WalkOutcome::Completed {
            break WalkOutcome::Completed;
        }
    };

    tracing::info!(
        elements_seen = stats.elements_seen,
        rows = stats.rows,
        full = stats.full,
        partial = stats.partial,
        missing_keys = stats.missing_keys,
        stopped = outcome == WalkOutcome::Stopped,
        "extraction pass finished"
    );
    for (column, count) in &stats.column_counts {
        tracing::debug!(column = column.name(), values = count, "column total");
    }

    Ok(Extraction {
        table,
        stats,
        outcome,
        walk: walker.stats().clone(),
    })
}
