//! Owned subtree of a single XML element.
//!
//! The walker materializes one of these for every element it visits.
//! Children are kept in document order; adjacent character data is merged
//! into a single text node.

use std::fmt::Write as _;

/// A child node: a nested element or a run of character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    fn node_count(&self) -> usize {
        match self {
            Node::Element(e) => e.node_count(),
            Node::Text(_) => 1,
        }
    }
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(&text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Value of the attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Leading character data: the text before the first child element.
    ///
    /// `None` when the element is empty or starts directly with a child
    /// element. For `<title>On <i>k</i>-SAT</title>` this is `"On "`.
    pub fn text(&self) -> Option<&str> {
        match self.children.first() {
            Some(Node::Text(t)) => Some(t),
            _ => None,
        }
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Serialize the element's content (without its own tags) as XML.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(&mut out, node);
        }
        out
    }

    /// Number of nodes in this subtree, the element itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Append character data, merging with a preceding text node.
    /// Returns `true` if a new node was created.
    pub(crate) fn push_text(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
            false
        } else {
            self.children.push(Node::Text(text.to_string()));
            true
        }
    }

    pub(crate) fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub(crate) fn push_attribute(&mut self, name: String, value: String) {
        self.attributes.push((name, value));
    }

    /// Drop every child node; returns how many nodes were freed.
    pub(crate) fn clear_children(&mut self) -> usize {
        let freed = self.children.iter().map(Node::node_count).sum();
        self.children.clear();
        freed
    }
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(t) => escape_text(out, t),
        Node::Element(e) => {
            let _ = write!(out, "<{}", e.tag);
            for (name, value) in &e.attributes {
                let _ = write!(out, " {}=\"", name);
                escape_attribute(out, value);
                out.push('"');
            }
            if e.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &e.children {
                    write_node(out, child);
                }
                let _ = write!(out, "</{}>", e.tag);
            }
        }
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
