//! Document type definitions: parsing and the lookups used for streaming
//! validation.
//!
//! Supports what the DBLP DTD uses: `<!ELEMENT>` with EMPTY, ANY, mixed
//! and element-only content, `<!ATTLIST>`, internal general and parameter
//! entities (parameter entity references are expanded inside declarations
//! and at top level), comments and processing instructions. Conditional
//! sections and external entities are rejected.

mod content;

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use content::{Automaton, ContentModel, Cursor, Particle, TextRule};

/// Parameter entity nesting limit; also bounds general entity recursion.
const MAX_EXPANSION_DEPTH: usize = 16;

static PE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%([A-Za-z_:][-A-Za-z0-9._:]*);").unwrap());
static GE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z_:][-A-Za-z0-9._:]*);").unwrap());

#[derive(Error, Debug)]
pub enum DtdError {
    #[error("unexpected end of DTD inside {0}")]
    UnexpectedEof(&'static str),
    #[error("malformed {what} declaration: {context}")]
    Malformed { what: &'static str, context: String },
    #[error("undeclared parameter entity %{0};")]
    UndeclaredParameterEntity(String),
    #[error("undeclared entity &{0}; in entity value")]
    UndeclaredEntity(String),
    #[error("entity {0} is recursive or nested too deeply")]
    Recursive(String),
    #[error("element type {0} declared more than once")]
    DuplicateElement(String),
    #[error("unsupported DTD construct: {0}")]
    Unsupported(String),
}

/// Declared type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    CData,
    /// ID, IDREF(S), ENTITY, ENTITIES, NMTOKEN(S).
    Tokenized(String),
    Enumeration(Vec<String>),
}

/// Default declaration of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeDefault {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeType,
    pub default: AttributeDefault,
}

/// The contents of a `<!DOCTYPE ...>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctype {
    pub root: String,
    pub system_id: Option<String>,
    pub internal_subset: Option<String>,
}

/// A parsed document type definition.
#[derive(Debug, Default)]
pub struct Dtd {
    elements: HashMap<String, ContentModel>,
    attlists: HashMap<String, Vec<AttributeDecl>>,
    entities: HashMap<String, String>,
}

impl Dtd {
    /// Parse a complete DTD from text.
    pub fn parse(text: &str) -> Result<Self, DtdError> {
        let mut builder = DtdBuilder::default();
        builder.feed(text)?;
        builder.finish()
    }

    pub fn element(&self, name: &str) -> Option<&ContentModel> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &str) -> &[AttributeDecl] {
        self.attlists.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fully expanded replacement text of a general entity.
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Check an element's attributes against its attribute list.
    /// Returns a description of the first violation.
    pub fn check_attributes(&self, element: &str, attrs: &[(String, String)]) -> Result<(), String> {
        let decls = self.attributes(element);

        for (name, value) in attrs {
            let Some(decl) = decls.iter().find(|d| &d.name == name) else {
                return Err(format!("attribute {name} is not declared for <{element}>"));
            };
            if let AttributeType::Enumeration(allowed) = &decl.kind
                && !allowed.iter().any(|a| a == value.trim())
            {
                return Err(format!(
                    "attribute {name}=\"{value}\" of <{element}> is not one of ({})",
                    allowed.join("|")
                ));
            }
            if let AttributeDefault::Fixed(fixed) = &decl.default
                && fixed != value
            {
                return Err(format!(
                    "attribute {name} of <{element}> must have the fixed value \"{fixed}\""
                ));
            }
        }

        for decl in decls {
            if decl.default == AttributeDefault::Required
                && !attrs.iter().any(|(n, _)| n == &decl.name)
            {
                return Err(format!(
                    "required attribute {} missing on <{element}>",
                    decl.name
                ));
            }
        }

        Ok(())
    }
}

/// Parse the text between `<!DOCTYPE` and the closing `>`.
pub fn parse_doctype(text: &str) -> Result<Doctype, DtdError> {
    let mut s = Scanner::new(text.trim_start_matches("DOCTYPE"));
    s.skip_ws();
    let root = s.name().ok_or_else(|| malformed("DOCTYPE", text))?;
    s.skip_ws();

    let mut system_id = None;
    if s.eat_keyword("SYSTEM") {
        s.skip_ws();
        system_id = Some(s.quoted().ok_or_else(|| malformed("DOCTYPE", text))?);
    } else if s.eat_keyword("PUBLIC") {
        s.skip_ws();
        s.quoted().ok_or_else(|| malformed("DOCTYPE", text))?;
        s.skip_ws();
        system_id = Some(s.quoted().ok_or_else(|| malformed("DOCTYPE", text))?);
    }
    s.skip_ws();

    let internal_subset = if s.eat("[") {
        let rest = s.rest();
        let end = rest.rfind(']').ok_or(DtdError::UnexpectedEof("DOCTYPE"))?;
        Some(rest[..end].to_string())
    } else {
        None
    };

    Ok(Doctype {
        root: root.to_string(),
        system_id,
        internal_subset,
    })
}

/// Accumulates declarations from one or more DTD sources (internal subset
/// first, then the external subset) before resolving entities.
#[derive(Debug, Default)]
pub struct DtdBuilder {
    parameter_entities: HashMap<String, String>,
    general_entities: HashMap<String, String>,
    external_entities: HashSet<String>,
    elements: HashMap<String, ContentModel>,
    attlists: HashMap<String, Vec<AttributeDecl>>,
}

impl DtdBuilder {
    pub fn feed(&mut self, text: &str) -> Result<(), DtdError> {
        self.feed_at_depth(text, 0)
    }

    fn feed_at_depth(&mut self, text: &str, depth: usize) -> Result<(), DtdError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(DtdError::Recursive("<top-level parameter entity>".into()));
        }
        let mut s = Scanner::new(text);
        loop {
            s.skip_ws();
            if s.at_end() {
                return Ok(());
            }
            if s.eat("<!--") {
                s.skip_past("-->").ok_or(DtdError::UnexpectedEof("comment"))?;
            } else if s.eat("<?") {
                s.skip_past("?>")
                    .ok_or(DtdError::UnexpectedEof("processing instruction"))?;
            } else if s.starts_with("<![") {
                return Err(DtdError::Unsupported("conditional section".into()));
            } else if s.eat("<!") {
                let body = s.declaration().ok_or(DtdError::UnexpectedEof("declaration"))?;
                self.declaration(body)?;
            } else if s.eat("%") {
                let name = s.name().ok_or_else(|| malformed("parameter entity reference", s.rest()))?;
                if !s.eat(";") {
                    return Err(malformed("parameter entity reference", name));
                }
                let value = self.parameter_entity(name)?.to_string();
                self.feed_at_depth(&value, depth + 1)?;
            } else {
                return Err(malformed("DTD", s.rest()));
            }
        }
    }

    fn parameter_entity(&self, name: &str) -> Result<&str, DtdError> {
        if self.external_entities.contains(&format!("%{name}")) {
            return Err(DtdError::Unsupported(format!(
                "external parameter entity %{name};"
            )));
        }
        self.parameter_entities
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| DtdError::UndeclaredParameterEntity(name.to_string()))
    }

    /// Replace `%name;` references until none remain.
    fn expand_parameter_refs(&self, text: &str) -> Result<String, DtdError> {
        let mut current = text.to_string();
        for _ in 0..MAX_EXPANSION_DEPTH {
            if !PE_REF.is_match(&current) {
                return Ok(current);
            }
            let mut out = String::with_capacity(current.len());
            let mut last = 0;
            for caps in PE_REF.captures_iter(&current) {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                out.push_str(&current[last..whole.start]);
                // Replacement text is padded with spaces outside literals
                out.push(' ');
                out.push_str(self.parameter_entity(&caps[1])?);
                out.push(' ');
                last = whole.end;
            }
            out.push_str(&current[last..]);
            current = out;
        }
        Err(DtdError::Recursive(text.trim().to_string()))
    }

    fn declaration(&mut self, body: &str) -> Result<(), DtdError> {
        let mut s = Scanner::new(body);
        let keyword = s.name().unwrap_or_default();
        match keyword {
            "ENTITY" => self.entity_decl(s.rest()),
            "ELEMENT" => {
                let expanded = self.expand_parameter_refs(s.rest())?;
                self.element_decl(&expanded)
            }
            "ATTLIST" => {
                let expanded = self.expand_parameter_refs(s.rest())?;
                self.attlist_decl(&expanded)
            }
            "NOTATION" => Ok(()),
            _ => Err(malformed("markup", body)),
        }
    }

    fn entity_decl(&mut self, body: &str) -> Result<(), DtdError> {
        let mut s = Scanner::new(body);
        s.skip_ws();
        let is_parameter = s.eat("%");
        s.skip_ws();
        let name = s.name().ok_or_else(|| malformed("ENTITY", body))?.to_string();
        s.skip_ws();

        let key = if is_parameter {
            format!("%{name}")
        } else {
            name.clone()
        };
        let declared_internal = if is_parameter {
            self.parameter_entities.contains_key(&name)
        } else {
            self.general_entities.contains_key(&name)
        };
        let already_declared = declared_internal || self.external_entities.contains(&key);

        if let Some(literal) = s.quoted() {
            // The first declaration of an entity is binding
            if already_declared {
                return Ok(());
            }
            let value = self.expand_parameter_refs(&literal)?;
            if is_parameter {
                self.parameter_entities.insert(name, value);
            } else {
                self.general_entities.insert(name, value);
            }
            Ok(())
        } else if s.eat_keyword("SYSTEM") || s.eat_keyword("PUBLIC") {
            if !already_declared {
                self.external_entities.insert(key);
            }
            Ok(())
        } else {
            Err(malformed("ENTITY", body))
        }
    }

    fn element_decl(&mut self, body: &str) -> Result<(), DtdError> {
        let mut s = Scanner::new(body);
        s.skip_ws();
        let name = s.name().ok_or_else(|| malformed("ELEMENT", body))?.to_string();
        s.skip_ws();
        let content = s.rest().trim();

        let model = if content == "EMPTY" {
            ContentModel::Empty
        } else if content == "ANY" {
            ContentModel::Any
        } else {
            parse_content_model(content).ok_or_else(|| malformed("ELEMENT", body))?
        };

        if self.elements.insert(name.clone(), model).is_some() {
            return Err(DtdError::DuplicateElement(name));
        }
        Ok(())
    }

    fn attlist_decl(&mut self, body: &str) -> Result<(), DtdError> {
        let mut s = Scanner::new(body);
        s.skip_ws();
        let element = s.name().ok_or_else(|| malformed("ATTLIST", body))?.to_string();
        let decls = self.attlists.entry(element).or_default();

        loop {
            s.skip_ws();
            if s.at_end() {
                return Ok(());
            }
            let name = s.name().ok_or_else(|| malformed("ATTLIST", body))?.to_string();
            s.skip_ws();

            let kind = if s.eat("(") {
                let list = s.take_until(')').ok_or_else(|| malformed("ATTLIST", body))?;
                s.eat(")");
                AttributeType::Enumeration(split_names(list, '|'))
            } else if s.eat_keyword("NOTATION") {
                s.skip_ws();
                if !s.eat("(") {
                    return Err(malformed("ATTLIST", body));
                }
                let list = s.take_until(')').ok_or_else(|| malformed("ATTLIST", body))?;
                s.eat(")");
                AttributeType::Enumeration(split_names(list, '|'))
            } else {
                let token = s.name().ok_or_else(|| malformed("ATTLIST", body))?;
                match token {
                    "CDATA" => AttributeType::CData,
                    "ID" | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "NMTOKEN" | "NMTOKENS" => {
                        AttributeType::Tokenized(token.to_string())
                    }
                    _ => return Err(malformed("ATTLIST", body)),
                }
            };
            s.skip_ws();

            let default = if s.eat("#REQUIRED") {
                AttributeDefault::Required
            } else if s.eat("#IMPLIED") {
                AttributeDefault::Implied
            } else if s.eat("#FIXED") {
                s.skip_ws();
                AttributeDefault::Fixed(s.quoted().ok_or_else(|| malformed("ATTLIST", body))?)
            } else {
                AttributeDefault::Value(s.quoted().ok_or_else(|| malformed("ATTLIST", body))?)
            };

            // The first definition of an attribute is binding
            if !decls.iter().any(|d| d.name == name) {
                decls.push(AttributeDecl {
                    name,
                    kind,
                    default,
                });
            }
        }
    }

    /// Resolve general entities and produce the final DTD.
    pub fn finish(self) -> Result<Dtd, DtdError> {
        let mut expanded = HashMap::with_capacity(self.general_entities.len());
        for name in self.general_entities.keys() {
            let mut stack = Vec::new();
            expand_general(name, &self.general_entities, &mut expanded, &mut stack)?;
        }
        Ok(Dtd {
            elements: self.elements,
            attlists: self.attlists,
            entities: expanded,
        })
    }
}

/// Expand the replacement text of general entity `name`, expanding the
/// entities it references first.
fn expand_general(
    name: &str,
    raw: &HashMap<String, String>,
    expanded: &mut HashMap<String, String>,
    stack: &mut Vec<String>,
) -> Result<(), DtdError> {
    if expanded.contains_key(name) {
        return Ok(());
    }
    if stack.iter().any(|s| s == name) || stack.len() > MAX_EXPANSION_DEPTH {
        return Err(DtdError::Recursive(name.to_string()));
    }
    let Some(value) = raw.get(name) else {
        return Err(DtdError::UndeclaredEntity(name.to_string()));
    };

    stack.push(name.to_string());
    for caps in GE_REF.captures_iter(value) {
        let referenced = &caps[1];
        if predefined_entity(referenced).is_none() {
            expand_general(referenced, raw, expanded, stack)?;
        }
    }
    stack.pop();

    let text = quick_xml::escape::unescape_with(value, |n| {
        predefined_entity(n).or_else(|| expanded.get(n).map(String::as_str))
    })
    .map_err(|e| malformed("ENTITY", &format!("{name}: {e}")))?
    .into_owned();
    expanded.insert(name.to_string(), text);
    Ok(())
}

/// Replacement text of the five entities every XML processor knows.
pub fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Parse `( ... )` content declarations into mixed or element-only models.
fn parse_content_model(content: &str) -> Option<ContentModel> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();

    if let Some(inner) = compact.strip_prefix("(#PCDATA") {
        let (list, _) = inner.rsplit_once(')')?;
        let names = list
            .split('|')
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
        return Some(ContentModel::Mixed(names));
    }

    let mut parser = ParticleParser {
        chars: compact.chars().collect(),
        pos: 0,
    };
    let particle = parser.particle()?;
    if parser.pos != parser.chars.len() {
        return None;
    }
    Some(ContentModel::Children(Automaton::compile(&particle)))
}

/// Recursive-descent parser for element-only content particles, run over
/// whitespace-free input.
struct ParticleParser {
    chars: Vec<char>,
    pos: usize,
}

impl ParticleParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn particle(&mut self) -> Option<Particle> {
        let base = if self.peek()? == '(' {
            self.pos += 1;
            self.group()?
        } else {
            Particle::Name(self.name()?)
        };
        Some(self.repetition(base))
    }

    fn group(&mut self) -> Option<Particle> {
        let first = self.particle()?;
        let mut items = vec![first];
        let mut separator = None;
        loop {
            match self.peek()? {
                ')' => {
                    self.pos += 1;
                    break;
                }
                c @ ('|' | ',') => {
                    if separator.is_some_and(|s| s != c) {
                        return None;
                    }
                    separator = Some(c);
                    self.pos += 1;
                    items.push(self.particle()?);
                }
                _ => return None,
            }
        }
        Some(match separator {
            Some('|') => Particle::Choice(items),
            _ => Particle::Seq(items),
        })
    }

    fn repetition(&mut self, base: Particle) -> Particle {
        let wrapped = match self.peek() {
            Some('?') => Particle::Optional(Box::new(base)),
            Some('*') => Particle::ZeroOrMore(Box::new(base)),
            Some('+') => Particle::OneOrMore(Box::new(base)),
            _ => return base,
        };
        self.pos += 1;
        wrapped
    }

    fn name(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn split_names(list: &str, sep: char) -> Vec<String> {
    list.split(sep)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn malformed(what: &'static str, context: &str) -> DtdError {
    let mut context: String = context.trim().chars().take(80).collect();
    if context.is_empty() {
        context.push_str("<empty>");
    }
    DtdError::Malformed { what, context }
}

/// Minimal cursor over DTD text.
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Like `eat`, but the keyword must not continue as a longer name.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if rest.starts_with(keyword)
            && !rest[keyword.len()..].starts_with(is_name_char)
        {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn skip_past(&mut self, marker: &str) -> Option<()> {
        let idx = self.rest().find(marker)?;
        self.pos += idx + marker.len();
        Some(())
    }

    fn take_until(&mut self, c: char) -> Option<&'a str> {
        let rest = self.rest();
        let idx = rest.find(c)?;
        self.pos += idx;
        Some(&rest[..idx])
    }

    fn name(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !is_name_char(c))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn quoted(&mut self) -> Option<String> {
        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let end = rest[1..].find(quote)?;
        self.pos += end + 2;
        Some(rest[1..=end].to_string())
    }

    /// Body of a `<!...>` declaration (the leading `<!` already consumed),
    /// honoring quoted literals that may contain `>`.
    fn declaration(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut quote: Option<char> = None;
        for (i, c) in rest.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '>') => {
                    self.pos += i + 1;
                    return Some(&rest[..i]);
                }
                _ => {}
            }
        }
        None
    }
}
