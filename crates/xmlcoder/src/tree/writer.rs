//! Writes an [`XmlDocument`] as text with quick-xml.

use super::{XmlDocument, XmlElement, XmlNode};
use crate::error::Result;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Deserialize;
use std::io::Write;

/// Text-level output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` before the root
    pub declaration: bool,
    /// Pretty-print with this many spaces per level
    pub indent: Option<usize>,
}

impl WriteOptions {
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    pub fn with_indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }
}

pub(super) fn write_document<W: Write>(
    document: &XmlDocument,
    inner: W,
    options: &WriteOptions,
) -> Result<()> {
    let mut writer = match options.indent {
        Some(spaces) => Writer::new_with_indent(inner, b' ', spaces),
        None => Writer::new(inner),
    };

    if options.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }
    write_element(&mut writer, &document.root, options.indent.is_some())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
    self_close_empty: bool,
) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for decl in &element.namespaces {
        let key = match &decl.prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }
    for attr in &element.attributes {
        start.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    // Indented output would put layout whitespace between `<a>` and `</a>`
    if self_close_empty && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(inner) => write_element(writer, inner, self_close_empty)?,
            XmlNode::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NamespaceDecl;

    fn render(document: &XmlDocument, options: &WriteOptions) -> String {
        let mut buffer = Vec::new();
        write_document(document, &mut buffer, options).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        let root = XmlElement::new("root")
            .with_attribute("q", "say \"hi\" & <bye>")
            .with_child(XmlElement::new("s").with_text("a&b <c> \"d\""));
        let xml = render(&XmlDocument::new(root), &WriteOptions::default());
        assert_eq!(
            xml,
            "<root q=\"say &quot;hi&quot; &amp; &lt;bye&gt;\"><s>a&amp;b &lt;c&gt; \"d\"</s></root>"
        );
    }

    #[test]
    fn test_namespaces_precede_attributes() {
        let mut root = XmlElement::new("root").with_attribute("a", "1");
        root.namespaces.push(NamespaceDecl {
            prefix: None,
            uri: "urn:d".to_string(),
        });
        root.namespaces.push(NamespaceDecl {
            prefix: Some("ns1".to_string()),
            uri: "urn:one".to_string(),
        });
        let xml = render(&XmlDocument::new(root), &WriteOptions::default());
        assert_eq!(
            xml,
            "<root xmlns=\"urn:d\" xmlns:ns1=\"urn:one\" a=\"1\"></root>"
        );
    }

    #[test]
    fn test_declaration() {
        let options = WriteOptions::default().with_declaration(true);
        let xml = render(&XmlDocument::new(XmlElement::new("root")), &options);
        assert_eq!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><root></root>");
    }

    #[test]
    fn test_indent_self_closes_empty_elements() {
        let root = XmlElement::new("root")
            .with_child(XmlElement::new("a").with_text("1"))
            .with_child(XmlElement::new("b"));
        let xml = render(&XmlDocument::new(root), &WriteOptions::default().with_indent(2));
        assert_eq!(xml, "<root>\n  <a>1</a>\n  <b/>\n</root>");
    }
}
