//! Streaming extraction of bibliographic records from the DBLP XML dump.
//!
//! Walks the document once with bounded memory while validating it against
//! its DTD, pulls the requested fields out of each record and normalizes
//! them (page ranges become page counts) into fixed-schema tables.

pub mod aggregate;
pub mod dtd;
pub mod element;
pub mod extractor;
pub mod kinds;
pub mod page_range;
pub mod pipeline;
pub mod walker;

use std::path::PathBuf;

use thiserror::Error;

pub use aggregate::{
    extract_entities, extract_entities_with_progress, ExtractProgress, Extraction,
    ExtractionRequest, ExtractionStats, Row, Table,
};
pub use dtd::DtdError;
pub use element::{Element, Node};
pub use extractor::{extract, Fields};
pub use kinds::{Column, EntityKind, Feature, KEY_COLUMN};
pub use page_range::{count_pages, parse_pages};
pub use pipeline::{run_passes, PassSpec};
pub use walker::{Disposition, FileWalker, StreamWalker, WalkOutcome, WalkStats, WalkerOptions};

/// Fatal errors while reading, validating or walking a document.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot load DTD {}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid DTD: {0}")]
    Dtd(#[from] DtdError),
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("document is not valid at byte {position}: {message}")]
    Validation { position: u64, message: String },
}

/// Rejected extraction requests. Raised before any input is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    #[error("feature {0} requested more than once")]
    DuplicateFeature(Feature),
    #[error("no entity types requested")]
    NoEntityTypes,
}
