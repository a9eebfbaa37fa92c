//! Closed vocabularies of DBLP record kinds and record attributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RequestError;

/// A DBLP record kind, i.e. a tag that may appear directly under `<dblp>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Article,
    Inproceedings,
    Proceedings,
    Book,
    Incollection,
    Phdthesis,
    Mastersthesis,
    Www,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Article,
        EntityKind::Inproceedings,
        EntityKind::Proceedings,
        EntityKind::Book,
        EntityKind::Incollection,
        EntityKind::Phdthesis,
        EntityKind::Mastersthesis,
        EntityKind::Www,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Article => "article",
            EntityKind::Inproceedings => "inproceedings",
            EntityKind::Proceedings => "proceedings",
            EntityKind::Book => "book",
            EntityKind::Incollection => "incollection",
            EntityKind::Phdthesis => "phdthesis",
            EntityKind::Mastersthesis => "mastersthesis",
            EntityKind::Www => "www",
        }
    }

    /// Look up the kind for an XML tag name. Returns `None` for tags that
    /// are not record kinds (`author`, `title`, `dblp`, ...).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s.trim()).ok_or_else(|| RequestError::UnknownEntityKind(s.to_string()))
    }
}

/// A record attribute, i.e. a child element tag of a DBLP record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Address,
    Author,
    Booktitle,
    Cdrom,
    Chapter,
    Cite,
    Crossref,
    Editor,
    Ee,
    Isbn,
    Journal,
    Month,
    Note,
    Number,
    Pages,
    Publisher,
    School,
    Series,
    Title,
    Url,
    Volume,
    Year,
}

impl Feature {
    pub const ALL: [Feature; 22] = [
        Feature::Address,
        Feature::Author,
        Feature::Booktitle,
        Feature::Cdrom,
        Feature::Chapter,
        Feature::Cite,
        Feature::Crossref,
        Feature::Editor,
        Feature::Ee,
        Feature::Isbn,
        Feature::Journal,
        Feature::Month,
        Feature::Note,
        Feature::Number,
        Feature::Pages,
        Feature::Publisher,
        Feature::School,
        Feature::Series,
        Feature::Title,
        Feature::Url,
        Feature::Volume,
        Feature::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Address => "address",
            Feature::Author => "author",
            Feature::Booktitle => "booktitle",
            Feature::Cdrom => "cdrom",
            Feature::Chapter => "chapter",
            Feature::Cite => "cite",
            Feature::Crossref => "crossref",
            Feature::Editor => "editor",
            Feature::Ee => "ee",
            Feature::Isbn => "isbn",
            Feature::Journal => "journal",
            Feature::Month => "month",
            Feature::Note => "note",
            Feature::Number => "number",
            Feature::Pages => "pages",
            Feature::Publisher => "publisher",
            Feature::School => "school",
            Feature::Series => "series",
            Feature::Title => "title",
            Feature::Url => "url",
            Feature::Volume => "volume",
            Feature::Year => "year",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == tag)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s.trim()).ok_or_else(|| RequestError::UnknownFeature(s.to_string()))
    }
}

/// Name of the reserved column holding the record key.
pub const KEY_COLUMN: &str = "key";

/// One output column: the record key or a requested feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Key,
    Feature(Feature),
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Key => KEY_COLUMN,
            Column::Feature(f) => f.as_str(),
        }
    }

    /// The fixed column layout `[key?] + features`.
    pub fn layout(features: &[Feature], include_key: bool) -> Vec<Column> {
        let key = include_key.then_some(Column::Key);
        key.into_iter()
            .chain(features.iter().copied().map(Column::Feature))
            .collect()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
