//! Forward-only, validating XML walker.
//!
//! Reads the document with quick-xml's pull parser and materializes each
//! element as an owned [`Element`] subtree. When an element's end tag is
//! reached the subtree is lent to the caller's visitor, whose
//! [`Disposition`] decides whether the subtree stays attached to its parent
//! (`Retain`) or is dropped together with every sibling materialized before
//! it (`Release`). Releasing each top-level record keeps memory bounded by
//! the size of one record, whatever the size of the document.
//!
//! Validation against the DTD named by the DOCTYPE happens while streaming:
//! every start tag is checked against its parent's content model and its
//! attribute list, character data against the element's content type, and
//! every end tag for complete content.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::dtd::{self, Cursor, Doctype, Dtd, DtdBuilder, TextRule};
use crate::element::Element;
use crate::ExtractError;

/// Read buffer size for file sources.
const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// What the walker does with an element after the visitor has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the subtree attached to its parent.
    Retain,
    /// Drop the subtree and all previously materialized siblings.
    Release,
    /// Release, then end the walk early.
    Stop,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The whole document was read.
    Completed,
    /// The visitor returned [`Disposition::Stop`].
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WalkerOptions {
    /// DTD to load instead of the DOCTYPE's system identifier.
    pub schema_path: Option<PathBuf>,
    pub buffer_capacity: usize,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self {
            schema_path: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Counters describing the walker's memory footprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Elements handed to the visitor.
    pub elements: u64,
    /// Nodes (elements and text runs) currently materialized.
    pub live_nodes: usize,
    pub peak_live_nodes: usize,
    pub peak_depth: usize,
}

struct OpenElement {
    element: Element,
    cursor: Cursor,
}

/// A walker over a file on disk, optionally gzip-compressed.
pub type FileWalker = StreamWalker<BufReader<Box<dyn Read + Send>>>;

pub struct StreamWalker<R> {
    xml: Reader<R>,
    base_dir: PathBuf,
    options: WalkerOptions,
    doctype: Option<Doctype>,
    dtd: Option<Dtd>,
    stack: Vec<OpenElement>,
    root_seen: bool,
    finished: bool,
    stats: WalkStats,
}

impl FileWalker {
    /// Open `path` for walking. Paths ending in `.gz` are decompressed on
    /// the fly; the DTD is resolved relative to the file's directory.
    pub fn open(path: &Path, options: WalkerOptions) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let inner: Box<dyn Read + Send> = if is_gzip(path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let reader = BufReader::with_capacity(options.buffer_capacity, inner);
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        tracing::debug!(path = %path.display(), "opened source document");
        Ok(Self::from_reader(reader, base_dir, options))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

impl<R: BufRead> StreamWalker<R> {
    /// Walk an already opened source. Relative DTD references are resolved
    /// against `base_dir`.
    pub fn from_reader(reader: R, base_dir: impl Into<PathBuf>, options: WalkerOptions) -> Self {
        let mut xml = Reader::from_reader(reader);
        let config = xml.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        config.check_end_names = true;

        Self {
            xml,
            base_dir: base_dir.into(),
            options,
            doctype: None,
            dtd: None,
            stack: Vec::new(),
            root_seen: false,
            finished: false,
            stats: WalkStats::default(),
        }
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Bytes of (decompressed) input consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.xml.buffer_position() as u64
    }

    pub fn doctype(&self) -> Option<&Doctype> {
        self.doctype.as_ref()
    }

    /// Visit every element in end-tag order until the document ends or the
    /// visitor returns [`Disposition::Stop`]. A stopped walk can be resumed
    /// by calling `walk` again.
    pub fn walk(
        &mut self,
        mut visit: impl FnMut(&Element) -> Disposition,
    ) -> Result<WalkOutcome, ExtractError> {
        if self.finished {
            return Ok(WalkOutcome::Completed);
        }

        let mut buf = Vec::with_capacity(4096);
        loop {
            match self.xml.read_event_into(&mut buf) {
                Ok(Event::DocType(ref e)) => {
                    let text = self.decode(e)?.into_owned();
                    self.load_doctype(&text)?;
                }
                // Empty elements arrive as Start + End
                Ok(Event::Start(ref e)) => self.open_element(e)?,
                Ok(Event::End(_)) => {
                    if self.close_element(&mut visit)? {
                        return Ok(WalkOutcome::Stopped);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let raw = self.decode(e)?.into_owned();
                    let text = self.unescape(&raw)?;
                    self.character_data(&text)?;
                }
                Ok(Event::CData(ref e)) => {
                    let text = self.decode(e)?.into_owned();
                    self.character_data(&text)?;
                }
                Ok(Event::Eof) => {
                    self.finish()?;
                    return Ok(WalkOutcome::Completed);
                }
                Ok(_) => {}
                Err(source) => {
                    return Err(ExtractError::Xml {
                        position: self.bytes_read(),
                        source,
                    });
                }
            }
            buf.clear();
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ExtractError {
        invalid_at(self.bytes_read(), message)
    }

    fn decode<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>, ExtractError> {
        self.xml
            .decoder()
            .decode(bytes)
            .map_err(|e| ExtractError::Xml {
                position: self.bytes_read(),
                source: quick_xml::Error::from(e),
            })
    }

    /// Resolve character references, predefined entities and the general
    /// entities declared in the DTD.
    fn unescape(&self, raw: &str) -> Result<String, ExtractError> {
        let dtd = self.dtd.as_ref();
        quick_xml::escape::unescape_with(raw, |name| {
            dtd::predefined_entity(name).or_else(|| dtd.and_then(|d| d.entity(name)))
        })
        .map(Cow::into_owned)
        .map_err(|e| self.invalid(e.to_string()))
    }

    fn load_doctype(&mut self, text: &str) -> Result<(), ExtractError> {
        let doctype = dtd::parse_doctype(text)?;
        let mut builder = DtdBuilder::default();

        // Internal subset declarations take precedence over external ones
        if let Some(subset) = &doctype.internal_subset {
            builder.feed(subset)?;
        }

        let schema_path = self.options.schema_path.clone().or_else(|| {
            doctype
                .system_id
                .as_ref()
                .map(|id| self.base_dir.join(id))
        });
        if let Some(path) = schema_path {
            let bytes = std::fs::read(&path).map_err(|source| ExtractError::Schema {
                path: path.clone(),
                source,
            })?;
            builder.feed(&String::from_utf8_lossy(&bytes))?;
            tracing::debug!(path = %path.display(), "loaded external DTD");
        }

        let dtd = builder.finish()?;
        tracing::debug!(
            root = %doctype.root,
            elements = dtd.element_count(),
            entities = dtd.entity_count(),
            "DTD ready"
        );
        self.doctype = Some(doctype);
        self.dtd = Some(dtd);
        Ok(())
    }

    fn open_element(&mut self, start: &BytesStart) -> Result<(), ExtractError> {
        let position = self.bytes_read();
        let tag = self.decode(start.name().as_ref())?.into_owned();

        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                invalid_at(position, format!("malformed attribute on <{tag}>: {e}"))
            })?;
            let name = self.decode(attr.key.as_ref())?.into_owned();
            let raw = self.decode(&attr.value)?.replace(['\t', '\n', '\r'], " ");
            attrs.push((name, self.unescape(&raw)?));
        }

        let Some(dtd) = self.dtd.as_ref() else {
            return Err(invalid_at(
                position,
                "document has no DOCTYPE declaration; a DTD is required",
            ));
        };

        match self.stack.last_mut() {
            None if self.root_seen => {
                return Err(invalid_at(
                    position,
                    format!("<{tag}> appears after the root element"),
                ));
            }
            None => {
                let expected = self.doctype.as_ref().map(|d| d.root.as_str());
                if expected != Some(tag.as_str()) {
                    return Err(invalid_at(
                        position,
                        format!(
                            "root element <{tag}> does not match DOCTYPE {}",
                            expected.unwrap_or("<none>")
                        ),
                    ));
                }
            }
            Some(parent) => {
                let parent_tag = parent.element.tag();
                let allowed = dtd
                    .element(parent_tag)
                    .is_some_and(|m| m.accept_child(&mut parent.cursor, &tag));
                if !allowed {
                    return Err(invalid_at(
                        position,
                        format!("<{tag}> is not allowed here in <{parent_tag}>"),
                    ));
                }
            }
        }

        let Some(model) = dtd.element(&tag) else {
            return Err(invalid_at(position, format!("element <{tag}> is not declared")));
        };
        dtd.check_attributes(&tag, &attrs)
            .map_err(|message| invalid_at(position, message))?;
        let cursor = model.cursor();

        let mut element = Element::new(tag);
        for (name, value) in attrs {
            element.push_attribute(name, value);
        }

        self.root_seen = true;
        self.stack.push(OpenElement { element, cursor });
        self.stats.peak_depth = self.stats.peak_depth.max(self.stack.len());
        self.grow(1);
        Ok(())
    }

    /// Validate and hand the innermost open element to the visitor.
    /// Returns `true` if the visitor asked to stop.
    fn close_element(
        &mut self,
        visit: &mut impl FnMut(&Element) -> Disposition,
    ) -> Result<bool, ExtractError> {
        let Some(open) = self.stack.pop() else {
            return Err(self.invalid("end tag without a matching start tag"));
        };

        let complete = self
            .dtd
            .as_ref()
            .and_then(|d| d.element(open.element.tag()))
            .is_some_and(|m| m.accepts_end(&open.cursor));
        if !complete {
            return Err(self.invalid(format!(
                "content of <{}> is incomplete",
                open.element.tag()
            )));
        }

        self.stats.elements += 1;
        let disposition = visit(&open.element);
        let subtree = open.element;

        let freed = match disposition {
            Disposition::Retain => match self.stack.last_mut() {
                Some(parent) => {
                    parent.element.push_child(subtree);
                    0
                }
                None => subtree.node_count(),
            },
            Disposition::Release | Disposition::Stop => {
                let siblings = self
                    .stack
                    .last_mut()
                    .map_or(0, |p| p.element.clear_children());
                subtree.node_count() + siblings
            }
        };
        self.shrink(freed);

        Ok(disposition == Disposition::Stop)
    }

    fn character_data(&mut self, text: &str) -> Result<(), ExtractError> {
        let position = self.bytes_read();
        let Some(open) = self.stack.last_mut() else {
            if is_xml_whitespace(text) {
                return Ok(());
            }
            return Err(invalid_at(position, "character data outside the root element"));
        };

        let tag = open.element.tag();
        let rule = self
            .dtd
            .as_ref()
            .and_then(|d| d.element(tag))
            .map_or(TextRule::Allowed, |m| m.text_rule());

        let created = match rule {
            TextRule::Allowed => open.element.push_text(text),
            // Ignorable whitespace is never materialized
            TextRule::WhitespaceOnly if is_xml_whitespace(text) => false,
            TextRule::WhitespaceOnly => {
                return Err(invalid_at(
                    position,
                    format!("character data is not allowed in <{tag}>"),
                ));
            }
            TextRule::Forbidden => {
                return Err(invalid_at(
                    position,
                    format!("<{tag}> is declared EMPTY but has content"),
                ));
            }
        };
        if created {
            self.grow(1);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExtractError> {
        if let Some(open) = self.stack.last() {
            return Err(self.invalid(format!(
                "document ends inside <{}>",
                open.element.tag()
            )));
        }
        if !self.root_seen {
            return Err(self.invalid("document has no root element"));
        }
        self.finished = true;
        tracing::debug!(
            elements = self.stats.elements,
            peak_live_nodes = self.stats.peak_live_nodes,
            peak_depth = self.stats.peak_depth,
            "walk complete"
        );
        Ok(())
    }

    fn grow(&mut self, nodes: usize) {
        self.stats.live_nodes += nodes;
        self.stats.peak_live_nodes = self.stats.peak_live_nodes.max(self.stats.live_nodes);
    }

    fn shrink(&mut self, nodes: usize) {
        self.stats.live_nodes = self.stats.live_nodes.saturating_sub(nodes);
    }
}

fn invalid_at(position: u64, message: impl Into<String>) -> ExtractError {
    ExtractError::Validation {
        position,
        message: message.into(),
    }
}

fn is_xml_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DTD: &str = include_str!("../tests/fixtures/dblp.dtd");

    fn walker(xml: &str) -> (tempfile::TempDir, FileWalker) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dblp.dtd"), DTD).unwrap();
        let path = dir.path().join("dblp.xml");
        std::fs::write(&path, xml).unwrap();
        let walker = StreamWalker::open(&path, WalkerOptions::default()).unwrap();
        (dir, walker)
    }

    fn doc(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE dblp SYSTEM \"dblp.dtd\">\n<dblp>\n{body}\n</dblp>\n"
        )
    }

    fn tags(xml: &str) -> Result<Vec<String>, ExtractError> {
        let (_dir, mut w) = walker(xml);
        let mut seen = Vec::new();
        w.walk(|e| {
            seen.push(e.tag().to_string());
            Disposition::Retain
        })?;
        Ok(seen)
    }

    fn validation_message(xml: &str) -> String {
        match tags(xml) {
            Err(ExtractError::Validation { message, .. }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_end_tag_order() {
        let xml = doc(r#"<article key="a"><author>A</author><title>T</title></article>"#);
        assert_eq!(tags(&xml).unwrap(), vec!["author", "title", "article", "dblp"]);
    }

    #[test]
    fn test_retained_children_visible_to_parent() {
        let xml = doc(
            r#"<article key="a"><author>Ann</author><author>Bob</author><title>On <i>k</i>-SAT</title></article>"#,
        );
        let (_dir, mut w) = walker(&xml);
        let mut record = None;
        w.walk(|e| {
            if e.tag() == "article" {
                record = Some(e.clone());
                Disposition::Release
            } else {
                Disposition::Retain
            }
        })
        .unwrap();
        let record = record.unwrap();
        assert_eq!(record.attribute("key"), Some("a"));
        let authors: Vec<_> = record
            .children()
            .filter(|c| c.tag() == "author")
            .filter_map(|c| c.text())
            .collect();
        assert_eq!(authors, vec!["Ann", "Bob"]);
        let title = record.children().find(|c| c.tag() == "title").unwrap();
        assert_eq!(title.text(), Some("On "));
        assert_eq!(title.inner_xml(), "On <i>k</i>-SAT");
    }

    #[test]
    fn test_entities_resolved_from_dtd() {
        let xml = doc(r#"<article key="a&amp;b"><author>J&uuml;rgen M&#252;ller &amp; Co</author></article>"#);
        let (_dir, mut w) = walker(&xml);
        let mut author = None;
        let mut key = None;
        w.walk(|e| {
            match e.tag() {
                "author" => author = e.text().map(String::from),
                "article" => key = e.attribute("key").map(String::from),
                _ => {}
            }
            Disposition::Retain
        })
        .unwrap();
        assert_eq!(author.as_deref(), Some("Jürgen Müller & Co"));
        assert_eq!(key.as_deref(), Some("a&b"));
    }

    #[test]
    fn test_release_drops_previous_siblings() {
        let records: String = (0..5)
            .map(|i| format!(r#"<article key="k{i}"><title>T{i}</title></article>"#))
            .collect();
        let xml = doc(&records);
        let (_dir, mut w) = walker(&xml);
        let mut root_children = None;
        w.walk(|e| match e.tag() {
            "article" => Disposition::Release,
            "dblp" => {
                root_children = Some(e.children().count());
                Disposition::Retain
            }
            _ => Disposition::Retain,
        })
        .unwrap();
        assert_eq!(root_children, Some(0));
        assert_eq!(w.stats().live_nodes, 0);
    }

    #[test]
    fn test_stop_is_distinct_from_completion() {
        let records: String = (0..4)
            .map(|i| format!(r#"<book key="b{i}"><title>B{i}</title></book>"#))
            .collect();
        let xml = doc(&records);
        let (_dir, mut w) = walker(&xml);

        let mut books = 0;
        let outcome = w
            .walk(|e| {
                if e.tag() != "book" {
                    return Disposition::Retain;
                }
                books += 1;
                if books == 2 {
                    Disposition::Stop
                } else {
                    Disposition::Release
                }
            })
            .unwrap();
        assert_eq!(outcome, WalkOutcome::Stopped);
        assert_eq!(books, 2);

        // Resuming picks up where the walk stopped
        let outcome = w
            .walk(|e| {
                if e.tag() == "book" {
                    books += 1;
                }
                Disposition::Release
            })
            .unwrap();
        assert_eq!(outcome, WalkOutcome::Completed);
        assert_eq!(books, 4);
    }

    #[test]
    fn test_self_closing_elements() {
        let xml = doc(r#"<article key="a"><author>A</author><title/></article><www key="w"/><book key="b"/>"#);
        assert_eq!(
            tags(&xml).unwrap(),
            vec!["author", "title", "article", "www", "book", "dblp"]
        );

        // Stop on a self-closing record, then resume
        let (_dir, mut w) = walker(&xml);
        let outcome = w
            .walk(|e| {
                if e.tag() == "www" {
                    Disposition::Stop
                } else {
                    Disposition::Retain
                }
            })
            .unwrap();
        assert_eq!(outcome, WalkOutcome::Stopped);
        let mut rest = Vec::new();
        let outcome = w
            .walk(|e| {
                rest.push(e.tag().to_string());
                Disposition::Release
            })
            .unwrap();
        assert_eq!(outcome, WalkOutcome::Completed);
        assert_eq!(rest, vec!["book", "dblp"]);

        let message = validation_message(&doc("<www/>"));
        assert!(message.contains("required attribute key"), "{message}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StreamWalker::open(&dir.path().join("nope.xml"), WalkerOptions::default());
        assert!(matches!(result, Err(ExtractError::Io(_))));
    }

    #[test]
    fn test_missing_dtd_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dblp.xml");
        std::fs::write(&path, doc("")).unwrap();
        let mut w = StreamWalker::open(&path, WalkerOptions::default()).unwrap();
        let err = w.walk(|_| Disposition::Release).unwrap_err();
        assert!(matches!(err, ExtractError::Schema { .. }));
    }

    #[test]
    fn test_schema_override() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("elsewhere.dtd");
        std::fs::write(&schema, DTD).unwrap();
        let path = dir.path().join("dblp.xml");
        std::fs::write(&path, doc(r#"<www key="w"/>"#)).unwrap();

        let options = WalkerOptions {
            schema_path: Some(schema),
            ..WalkerOptions::default()
        };
        let mut w = StreamWalker::open(&path, options).unwrap();
        assert_eq!(w.walk(|_| Disposition::Release).unwrap(), WalkOutcome::Completed);
        assert_eq!(w.stats().elements, 2);
    }

    #[test]
    fn test_validation_errors() {
        let undeclared = validation_message(&doc(r#"<article key="a"><abstract>x</abstract></article>"#));
        assert!(undeclared.contains("<abstract>"), "{undeclared}");

        let wrong_parent = validation_message(&doc(r#"<author>x</author>"#));
        assert!(wrong_parent.contains("not allowed here in <dblp>"), "{wrong_parent}");

        let missing_key = validation_message(&doc(r#"<article><title>x</title></article>"#));
        assert!(missing_key.contains("required attribute key"), "{missing_key}");

        let stray_text = validation_message(&doc(r#"<article key="a">loose text</article>"#));
        assert!(stray_text.contains("character data"), "{stray_text}");

        let entity = validation_message(&doc(r#"<article key="a"><note>&nosuch;</note></article>"#));
        assert!(entity.contains("nosuch"), "{entity}");

        let bad_enum = validation_message(&doc(r#"<article key="a"><ee type="closed">x</ee></article>"#));
        assert!(bad_enum.contains("type"), "{bad_enum}");
    }

    #[test]
    fn test_doctype_required() {
        let xml = "<?xml version=\"1.0\"?>\n<dblp></dblp>";
        let message = validation_message(xml);
        assert!(message.contains("DOCTYPE"), "{message}");
    }

    #[test]
    fn test_root_must_match_doctype() {
        let xml = "<!DOCTYPE dblp SYSTEM \"dblp.dtd\">\n<article key=\"a\"></article>";
        let message = validation_message(xml);
        assert!(message.contains("does not match DOCTYPE"), "{message}");
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let xml = doc(r#"<article key="a"><title>x</author></article>"#);
        assert!(matches!(tags(&xml), Err(ExtractError::Xml { .. })));
    }

    #[test]
    fn test_internal_subset() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE note [
  <!ELEMENT note (#PCDATA)>
  <!ENTITY who "world">
]>
<note>hello &who;</note>"#;
        let dir = tempfile::tempdir().unwrap();
        let mut w = StreamWalker::from_reader(xml.as_bytes(), dir.path(), WalkerOptions::default());
        let mut text = None;
        w.walk(|e| {
            text = e.text().map(String::from);
            Disposition::Release
        })
        .unwrap();
        assert_eq!(text.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_gzip_source() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dblp.dtd"), DTD).unwrap();
        let path = dir.path().join("dblp.xml.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(doc(r#"<phdthesis key="p"><school>S</school></phdthesis>"#).as_bytes())
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let mut w = StreamWalker::open(&path, WalkerOptions::default()).unwrap();
        let mut seen = Vec::new();
        w.walk(|e| {
            seen.push(e.tag().to_string());
            Disposition::Release
        })
        .unwrap();
        assert_eq!(seen, vec!["school", "phdthesis", "dblp"]);
    }

    #[test]
    fn test_peak_memory_independent_of_document_size() {
        fn peak(records: usize) -> WalkStats {
            let body: String = (0..records)
                .map(|i| {
                    format!(
                        "<article key=\"k{i}\">\n  <author>A{i}</author>\n  <author>B{i}</author>\n  <title>T <i>{i}</i></title>\n  <pages>1-{i}</pages>\n</article>\n"
                    )
                })
                .collect();
            let (_dir, mut w) = walker(&doc(&body));
            w.walk(|e| {
                if e.tag() == "article" {
                    Disposition::Release
                } else {
                    Disposition::Retain
                }
            })
            .unwrap();
            w.stats().clone()
        }

        let small = peak(10);
        let large = peak(5_000);
        assert_eq!(large.elements, 5_000 * 6 + 1);
        assert_eq!(small.peak_live_nodes, large.peak_live_nodes);
        assert_eq!(small.peak_depth, large.peak_depth);
        assert!(large.peak_live_nodes < 20);
    }
}
