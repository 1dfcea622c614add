//! In-memory XML tree exchanged between the coder and quick-xml.
//!
//! The tree keeps exactly what encoding and decoding need: element names as
//! written (`prefix:local`), attributes and namespace declarations in document
//! order, and mixed element/text children. Comments, processing instructions
//! and the DOCTYPE are not represented.

mod reader;
mod writer;

pub use writer::WriteOptions;

use crate::error::{Result, XmlCoderError};
use crate::options::DEFAULT_MAX_DEPTH;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// A parsed or freshly encoded document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

/// A named element with attributes, namespace declarations and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub namespaces: Vec<NamespaceDecl>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

/// An `xmlns` (prefix `None`) or `xmlns:prefix` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        XmlDocument { root }
    }

    /// Parses a complete document, nested at most [`DEFAULT_MAX_DEPTH`]
    /// elements below the root.
    pub fn parse(xml: &str) -> Result<Self> {
        Self::parse_with_max_depth(xml, DEFAULT_MAX_DEPTH)
    }

    /// Parses a complete document, failing with
    /// [`InvalidValue`](XmlCoderError::InvalidValue) once elements nest
    /// more than `max_depth` levels below the root.
    pub fn parse_with_max_depth(xml: &str, max_depth: usize) -> Result<Self> {
        reader::parse_document(xml, max_depth)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::parse(utf8(bytes)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        Self::parse(&xml)
    }

    pub fn write_to<W: Write>(&self, writer: W, options: &WriteOptions) -> Result<()> {
        writer::write_document(self, writer, options)
    }

    pub fn to_xml_vec(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, options)?;
        Ok(buffer)
    }

    pub fn to_xml_string(&self, options: &WriteOptions) -> Result<String> {
        let buffer = self.to_xml_vec(options)?;
        String::from_utf8(buffer).map_err(|e| XmlCoderError::from(e.to_string()))
    }
}

impl FromStr for XmlDocument {
    type Err = XmlCoderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = self
            .to_xml_string(&WriteOptions::default())
            .map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(&text.into());
        self
    }

    /// Appends text, merging it into a directly preceding text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.children.last_mut() {
            Some(XmlNode::Text(last)) => last.push_str(text),
            _ => self.children.push(XmlNode::Text(text.to_string())),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn has_child_elements(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// No attributes and no children at all.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Splits the written name into `(prefix, local)`.
    pub fn split_name(&self) -> (Option<&str>, &str) {
        split_qualified(&self.name)
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    let mut pending = vec![element.children.iter()];
    while let Some(children) = pending.last_mut() {
        match children.next() {
            Some(XmlNode::Text(text)) => out.push_str(text),
            Some(XmlNode::Element(inner)) => pending.push(inner.children.iter()),
            None => {
                pending.pop();
            }
        }
    }
}

pub(crate) fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| XmlCoderError::from(format!("Invalid UTF-8 in XML: {}", e)))
}

/// Splits `prefix:local` at the first colon.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_text_merges_adjacent_runs() {
        let mut element = XmlElement::new("a");
        element.push_text("one");
        element.push_text(" two");
        element.children.push(XmlNode::Element(XmlElement::new("b")));
        element.push_text("three");
        element.push_text("");

        assert_eq!(element.children.len(), 3);
        assert_eq!(element.text(), "one twothree");
    }

    #[test]
    fn test_text_descends_into_children() {
        let element = XmlElement::new("a")
            .with_text("x")
            .with_child(XmlElement::new("b").with_text("y"));
        assert_eq!(element.text(), "xy");
        assert!(element.has_child_elements());
        assert!(!element.is_empty());
        assert!(XmlElement::new("c").is_empty());
    }

    #[test]
    fn test_text_of_a_deep_chain() {
        let mut element = XmlElement::new("leaf").with_text("end");
        for _ in 0..100_000 {
            element = XmlElement::new("a").with_child(element);
        }
        assert_eq!(element.text(), "end");

        // Take the chain apart level by level before it goes out of scope
        let mut node = element;
        while let Some(XmlNode::Element(child)) = node.children.pop() {
            node = child;
        }
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let depth = 100_000;
        let xml = format!("<root>{}{}</root>", "<a>".repeat(depth), "</a>".repeat(depth));
        let err = XmlDocument::parse(&xml).unwrap_err();
        assert!(matches!(err, XmlCoderError::InvalidValue { .. }));

        let xml = format!("<root>{}{}</root>", "<a>".repeat(3), "</a>".repeat(3));
        assert!(XmlDocument::parse_with_max_depth(&xml, 3).is_ok());
        assert!(XmlDocument::parse_with_max_depth(&xml, 2).is_err());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(XmlElement::new("ns1:item").split_name(), (Some("ns1"), "item"));
        assert_eq!(XmlElement::new("item").split_name(), (None, "item"));
    }
}
