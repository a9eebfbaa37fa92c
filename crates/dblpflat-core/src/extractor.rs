//! Per-record field extraction.
//!
//! Given one record element (`<article>`, `<book>`, ...) and the requested
//! features, collects the text of every matching child element in document
//! order. Titles that open with inline markup fall back to their
//! tag-stripped content; page ranges are normalized to page counts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::element::Element;
use crate::kinds::{Column, Feature};
use crate::page_range::parse_pages;

/// Non-greedy tag matcher used to flatten titles that start with markup.
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());

/// Extracted values for one record, one entry per requested column in
/// request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    columns: Vec<(Column, Vec<String>)>,
    missing_key: bool,
}

impl Fields {
    fn new(layout: Vec<Column>) -> Self {
        Self {
            columns: layout.into_iter().map(|c| (c, Vec::new())).collect(),
            missing_key: false,
        }
    }

    fn push(&mut self, column: Column, value: String) {
        if let Some((_, values)) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            values.push(value);
        }
    }

    /// Values of `column`, or `None` if it was not requested.
    pub fn get(&self, column: Column) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, &[String])> {
        self.columns.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    /// The key column was requested but the element had no `key` attribute.
    pub fn missing_key(&self) -> bool {
        self.missing_key
    }

    /// Every requested feature has at least one value. The key column does
    /// not count.
    pub fn is_full(&self) -> bool {
        self.columns
            .iter()
            .filter(|(c, _)| matches!(c, Column::Feature(_)))
            .all(|(_, v)| !v.is_empty())
    }

    /// Consume into cells in column order.
    pub fn into_cells(self) -> Vec<Vec<String>> {
        self.columns.into_iter().map(|(_, v)| v).collect()
    }
}

/// Extract the requested features (and optionally the `key` attribute)
/// from a record element.
///
/// Child elements whose tag is not requested are ignored. Empty and
/// whitespace-only values are dropped.
pub fn extract(element: &Element, features: &[Feature], include_key: bool) -> Fields {
    let mut fields = Fields::new(Column::layout(features, include_key));

    if include_key {
        match element.attribute("key") {
            Some(key) if !key.trim().is_empty() => fields.push(Column::Key, key.to_string()),
            _ => {
                tracing::warn!(tag = element.tag(), "record has no key attribute");
                fields.missing_key = true;
            }
        }
    }

    for child in element.children() {
        let Some(feature) = Feature::from_tag(child.tag()) else {
            continue;
        };
        if !features.contains(&feature) {
            continue;
        }
        let Some(value) = feature_value(feature, child) else {
            continue;
        };
        if !value.trim().is_empty() {
            fields.push(Column::Feature(feature), value);
        }
    }

    fields
}

fn feature_value(feature: Feature, child: &Element) -> Option<String> {
    match feature {
        Feature::Title => Some(match child.text() {
            Some(text) => text.to_string(),
            None => MARKUP.replace_all(&child.inner_xml(), "").into_owned(),
        }),
        Feature::Pages => Some(parse_pages(child.text().unwrap_or_default())),
        _ => child.text().map(str::to_string),
    }
}
