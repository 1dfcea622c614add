//! Builds an [`XmlDocument`] from text with quick-xml.

use super::{NamespaceDecl, XmlAttribute, XmlDocument, XmlElement, XmlNode};
use crate::error::{Result, XmlCoderError};
use crate::path::CodingPath;
use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

/// Parses `xml`, allowing at most `max_depth` levels of elements below the
/// root.
pub(super) fn parse_document(xml: &str, max_depth: usize) -> Result<XmlDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                check_nesting(&stack, max_depth)?;
                stack.push(element_from_start(&e)?);
            }
            Event::Empty(e) => {
                check_nesting(&stack, max_depth)?;
                let element = element_from_start(&e)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlCoderError::Syntax("unexpected closing tag".to_string()))?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| XmlCoderError::Syntax(e.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(e.as_ref())
                    .map_err(|e| XmlCoderError::Syntax(e.to_string()))?;
                push_text(&mut stack, text)?;
            }
            Event::GeneralRef(e) => {
                let raw = e.decode().map_err(|e| XmlCoderError::Syntax(e.to_string()))?;
                let resolved = resolve_entity(&raw)?;
                push_text(&mut stack, &resolved)?;
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlCoderError::Syntax(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    let root = root.ok_or(XmlCoderError::RootNotFound)?;
    trace!(root = %root.name, "parsed XML document");
    Ok(XmlDocument::new(root))
}

/// Rejects an element that would open below `max_depth` levels under the root.
fn check_nesting(stack: &[XmlElement], max_depth: usize) -> Result<()> {
    if stack.len() > max_depth {
        return Err(XmlCoderError::invalid_value(
            &CodingPath::new(),
            format!("document nesting exceeds the maximum depth of {}", max_depth),
        ));
    }
    Ok(())
}

fn element_from_start(start: &BytesStart) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlCoderError::Syntax(e.to_string()))?
        .to_string();
    let mut element = XmlElement::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlCoderError::Syntax(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlCoderError::Syntax(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlCoderError::Syntax(e.to_string()))?
            .into_owned();

        if key == "xmlns" {
            element.namespaces.push(NamespaceDecl {
                prefix: None,
                uri: value,
            });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.push(NamespaceDecl {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            element.attributes.push(XmlAttribute {
                name: key.to_string(),
                value,
            });
        }
    }

    Ok(element)
}

fn close_element(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlCoderError::Syntax(format!(
                "second root element <{}>",
                element.name
            )));
        }
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push_text(text),
        None if text.trim().is_empty() => {}
        None => {
            return Err(XmlCoderError::Syntax(
                "text outside of the root element".to_string(),
            ));
        }
    }
    Ok(())
}

/// Resolves a general entity reference (`amp`, `#10`, `#x41`).
fn resolve_entity(raw: &str) -> Result<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.into());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16)
                .map_err(|_| XmlCoderError::Syntax(format!("invalid hex entity: #{}", rest)))?
        } else {
            rest.parse::<u32>()
                .map_err(|_| XmlCoderError::Syntax(format!("invalid decimal entity: #{}", rest)))?
        };
        let ch = char::from_u32(code)
            .ok_or_else(|| XmlCoderError::Syntax(format!("invalid code point: {}", code)))?;
        return Ok(ch.to_string());
    }

    Err(XmlCoderError::Syntax(format!("unknown entity &{};", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_MAX_DEPTH;

    fn parse_document_default(xml: &str) -> Result<XmlDocument> {
        parse_document(xml, DEFAULT_MAX_DEPTH)
    }

    #[test]
    fn test_parse_mixed_content() {
        let doc = parse_document_default(
            "<?xml version=\"1.0\"?><root a=\"1\">zero<b>x</b>one<!-- note --><c/></root>",
        )
        .unwrap();
        let root = &doc.root;
        assert_eq!(root.name, "root");
        assert_eq!(root.attribute("a"), Some("1"));
        assert_eq!(root.children.len(), 4);
        assert_eq!(root.children[0], XmlNode::Text("zero".to_string()));
        assert_eq!(root.children[2], XmlNode::Text("one".to_string()));
    }

    #[test]
    fn test_entities_merge_into_one_text_run() {
        let doc = parse_document_default("<s>a&amp;b&#x41;&#66;<![CDATA[<c>]]></s>").unwrap();
        assert_eq!(doc.root.children, vec![XmlNode::Text("a&bAB<c>".to_string())]);
    }

    #[test]
    fn test_namespace_declarations_are_split_from_attributes() {
        let doc =
            parse_document_default("<root xmlns=\"urn:d\" xmlns:p=\"urn:p\" p:x=\"1\"/>").unwrap();
        assert_eq!(doc.root.namespaces.len(), 2);
        assert_eq!(doc.root.namespaces[0].prefix, None);
        assert_eq!(doc.root.namespaces[1].prefix.as_deref(), Some("p"));
        assert_eq!(doc.root.attribute("p:x"), Some("1"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            parse_document_default("<a></b>"),
            Err(XmlCoderError::Xml(_))
        ));
        assert!(matches!(
            parse_document_default("<a/><b/>"),
            Err(XmlCoderError::Syntax(_))
        ));
        assert!(parse_document_default("<a>").is_err());
        assert!(matches!(parse_document_default("  "), Err(XmlCoderError::RootNotFound)));
    }

    #[test]
    fn test_nesting_limit() {
        assert!(parse_document("<a><b><c/></b></a>", 2).is_ok());
        let err = parse_document("<a><b><c><d/></c></b></a>", 2).unwrap_err();
        assert!(matches!(err, XmlCoderError::InvalidValue { .. }));
        assert_eq!(err.message(), "document nesting exceeds the maximum depth of 2");
    }
}
