//! Multi-pass extraction: one independent walk of the source per table.

use std::path::Path;

use crate::aggregate::{extract_entities_with_progress, ExtractProgress, Extraction, ExtractionRequest};
use crate::walker::{StreamWalker, WalkerOptions};
use crate::ExtractError;

/// A named output table and the request that fills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSpec {
    pub table: String,
    pub request: ExtractionRequest,
}

impl PassSpec {
    pub fn new(table: impl Into<String>, request: ExtractionRequest) -> Self {
        Self {
            table: table.into(),
            request,
        }
    }
}

/// Run every pass over `source` in order, each with a fresh walker.
///
/// `on_progress` receives the pass's table name with each snapshot;
/// `on_pass` receives each finished extraction and may fail, which aborts
/// the remaining passes. Returns the number of passes run.
pub fn run_passes<E>(
    source: &Path,
    options: &WalkerOptions,
    passes: &[PassSpec],
    mut on_progress: impl FnMut(&str, ExtractProgress),
    mut on_pass: impl FnMut(&PassSpec, Extraction) -> Result<(), E>,
) -> Result<usize, E>
where
    E: From<ExtractError>,
{
    for (index, pass) in passes.iter().enumerate() {
        let span = tracing::info_span!("pass", table = %pass.table, index);
        let _enter = span.enter();

        let mut walker = StreamWalker::open(source, options.clone())?;
        let extraction = extract_entities_with_progress(&mut walker, &pass.request, |p| {
            on_progress(&pass.table, p)
        })?;
        on_pass(pass, extraction)?;
    }
    Ok(passes.len())
}
