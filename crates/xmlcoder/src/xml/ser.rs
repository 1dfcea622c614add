//! Encode tree builder.
//!
//! A custom `serde::Serializer` that builds an [`XmlElement`] tree while the
//! value's `Serialize` impl walks its fields. Every value is serialized
//! against a [`Target`] (the XML name and role its field resolved to) and
//! hands back what it [`Produced`]. Composite values collect their members
//! in an [`EncodeFrame`] owned by the compound serializer for that value;
//! `end()` folds the frame into the value's own element. A frame therefore
//! lives exactly as long as its value is being built, and a failing member
//! drops its frame on the way out.

use crate::convert;
use crate::error::{Result, XmlCoderError};
use crate::namespace::NamespaceTable;
use crate::options::{EncoderOptions, NilStrategy};
use crate::path::{CodingPath, PathSegment};
use crate::role::{self, FieldKey, NodeRole};
use crate::tree::{XmlAttribute, XmlDocument, XmlElement, XmlNode};
use crate::xml::utils::{self, DEFAULT_ITEM_NAME};
use chrono::{DateTime, Utc};
use serde::ser::{self, Serialize};
use std::io::Write;
use tracing::{debug, trace};
use xmlcoder_support::{DATE_TOKEN, INLINE_TOKEN};

/// Encodes a value as an XML string with default options.
///
/// ```
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Book {
///     #[serde(rename = "@id")]
///     id: u32,
///     title: String,
/// }
///
/// let xml = xmlcoder::to_xml_string(&Book { id: 7, title: "Dune".into() })?;
/// assert_eq!(xml, r#"<root id="7"><title>Dune</title></root>"#);
/// # Ok::<(), xmlcoder::XmlCoderError>(())
/// ```
pub fn to_xml_string<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let options = EncoderOptions::default();
    encode_document(value, &options)?.to_xml_string(&options.write)
}

/// Encodes a value as UTF-8 XML bytes with default options.
pub fn to_xml_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let options = EncoderOptions::default();
    encode_document(value, &options)?.to_xml_vec(&options.write)
}

/// Encodes a value into a writer with default options.
pub fn to_xml_writer<W, T>(writer: W, value: &T) -> Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    let options = EncoderOptions::default();
    encode_document(value, &options)?.write_to(writer, &options.write)
}

/// Encodes `value` into a document whose root carries the configured name.
pub fn encode_document<T>(value: &T, options: &EncoderOptions) -> Result<XmlDocument>
where
    T: Serialize + ?Sized,
{
    debug!(root = %options.root_name, "encoding value");
    let mut session = EncodeSession {
        options,
        namespaces: NamespaceTable::new(
            options.default_namespace.as_deref(),
            &options.namespace_map,
            &options.namespace_prefix,
        ),
        path: CodingPath::new(),
    };

    let target = Target::element(options.root_name.clone());
    let produced = value.serialize(ValueSerializer {
        session: &mut session,
        target,
    })?;

    let mut root = produced.into_element(&options.root_name);
    root.namespaces = session.namespaces.declarations();
    debug!(
        root = %root.name,
        namespaces = root.namespaces.len(),
        "encoded value"
    );
    Ok(XmlDocument::new(root))
}

/// State owned by one encode call.
struct EncodeSession<'o> {
    options: &'o EncoderOptions,
    namespaces: NamespaceTable,
    path: CodingPath,
}

impl EncodeSession<'_> {
    /// Where a field goes: its renamed, prefixed name and its role.
    ///
    /// `self.path` already ends with the field's key.
    fn field_target(&mut self, field: &FieldKey) -> Target {
        let options = self.options;
        let name = match field.role {
            NodeRole::InlineText => String::new(),
            NodeRole::Attribute => {
                let local = options.attribute_names().apply(&self.path, &field.local_name);
                self.qualify(field, &local)
            }
            NodeRole::Element | NodeRole::Array(_) => {
                let local = options.element_names().apply(&self.path, &field.local_name);
                self.qualify(field, &local)
            }
        };
        Target {
            name,
            role: field.role.clone(),
            inline_item: false,
        }
    }

    fn qualify(&mut self, field: &FieldKey, local: &str) -> String {
        let options = self.options;
        let prefix = field
            .effective_namespace(options.default_namespace.as_deref())
            .and_then(|uri| self.namespaces.name_for(uri));
        utils::qualified(prefix.as_deref(), local)
    }

    fn check_depth(&self) -> Result<()> {
        if self.path.len() >= self.options.max_depth {
            return Err(XmlCoderError::invalid_value(
                &self.path,
                format!(
                    "value nesting exceeds the maximum depth of {}",
                    self.options.max_depth
                ),
            ));
        }
        Ok(())
    }
}

/// Name and role a value is being encoded as.
#[derive(Debug, Clone)]
struct Target {
    name: String,
    role: NodeRole,
    /// Set for items of an `Array(None)` sequence, where `Inline<T>` applies.
    /// An `Inline<T>` item keeps it to splice its members into the parent.
    inline_item: bool,
}

impl Target {
    fn element(name: String) -> Self {
        Target {
            name,
            role: NodeRole::Element,
            inline_item: false,
        }
    }

    /// Wraps converted scalar text according to the role.
    fn scalar(&self, text: String) -> Produced {
        match self.role {
            NodeRole::Element | NodeRole::Array(_) => {
                Produced::Element(XmlElement::new(self.name.as_str()).with_text(text))
            }
            NodeRole::Attribute => Produced::Attribute(XmlAttribute {
                name: self.name.clone(),
                value: text,
            }),
            NodeRole::InlineText => Produced::Text(text),
        }
    }

    /// Folds a finished frame according to the role.
    fn fold(&self, frame: EncodeFrame, path: &CodingPath) -> Result<Produced> {
        match self.role {
            NodeRole::Element | NodeRole::Array(_) => Ok(Produced::Element(XmlElement {
                name: self.name.clone(),
                attributes: frame.attributes,
                namespaces: Vec::new(),
                children: frame.nodes,
            })),
            NodeRole::Attribute => {
                if frame.is_empty() {
                    return Ok(Produced::Nothing);
                }
                if !frame.attributes.is_empty() {
                    return Err(XmlCoderError::invalid_value(
                        path,
                        format!("attribute {} cannot carry attributes", self.name),
                    ));
                }
                let mut value = String::new();
                for node in frame.nodes {
                    match node {
                        XmlNode::Text(text) => value.push_str(&text),
                        XmlNode::Element(element) => {
                            return Err(XmlCoderError::invalid_value(
                                path,
                                format!(
                                    "attribute {} cannot contain element <{}>",
                                    self.name, element.name
                                ),
                            ));
                        }
                    }
                }
                Ok(Produced::Attribute(XmlAttribute {
                    name: self.name.clone(),
                    value,
                }))
            }
            NodeRole::InlineText => {
                if !self.inline_item {
                    return Err(XmlCoderError::invalid_value(
                        path,
                        "inline text must be a scalar value",
                    ));
                }
                if !frame.attributes.is_empty() {
                    return Err(XmlCoderError::invalid_value(
                        path,
                        "inline content cannot carry attributes",
                    ));
                }
                Ok(Produced::Splice(frame.nodes))
            }
        }
    }

    fn nil(&self, policy: NilStrategy) -> Produced {
        match (policy, &self.role) {
            (NilStrategy::Missing, _) | (NilStrategy::Empty, NodeRole::InlineText) => {
                Produced::Nothing
            }
            (NilStrategy::Empty, _) => self.scalar(String::new()),
        }
    }
}

/// What encoding one value contributes to its parent frame.
enum Produced {
    Element(XmlElement),
    Attribute(XmlAttribute),
    Text(String),
    /// Nodes that join the parent's children unwrapped
    Splice(Vec<XmlNode>),
    Nothing,
}

impl Produced {
    fn into_element(self, name: &str) -> XmlElement {
        match self {
            Produced::Element(element) => element,
            Produced::Attribute(attribute) => {
                let mut element = XmlElement::new(name);
                element.attributes.push(attribute);
                element
            }
            Produced::Text(text) => XmlElement::new(name).with_text(text),
            Produced::Splice(nodes) => XmlElement {
                children: nodes,
                ..XmlElement::new(name)
            },
            Produced::Nothing => XmlElement::new(name),
        }
    }
}

/// Children and attributes collected for one composite value.
///
/// Text runs are read back positionally, so a frame refuses layouts that
/// would not decode to the same runs: two runs side by side, or a run after
/// one that was left out.
#[derive(Debug, Default)]
struct EncodeFrame {
    nodes: Vec<XmlNode>,
    attributes: Vec<XmlAttribute>,
    skipped_text: bool,
}

impl EncodeFrame {
    fn append(&mut self, produced: Produced, path: &CodingPath) -> Result<()> {
        match produced {
            Produced::Element(element) => self.nodes.push(XmlNode::Element(element)),
            Produced::Attribute(attribute) => self.attributes.push(attribute),
            Produced::Text(text) if text.is_empty() => self.skipped_text = true,
            Produced::Text(text) => self.push_node(XmlNode::Text(text), path)?,
            Produced::Splice(nodes) => {
                for node in nodes {
                    self.push_node(node, path)?;
                }
            }
            Produced::Nothing => {}
        }
        Ok(())
    }

    fn push_node(&mut self, node: XmlNode, path: &CodingPath) -> Result<()> {
        if let XmlNode::Text(_) = node {
            if self.skipped_text {
                return Err(XmlCoderError::invalid_value(
                    path,
                    "inline text cannot follow an empty inline text run",
                ));
            }
            if let Some(XmlNode::Text(_)) = self.nodes.last() {
                return Err(XmlCoderError::invalid_value(
                    path,
                    "adjacent inline text runs would merge into one",
                ));
            }
        }
        self.nodes.push(node);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.attributes.is_empty()
    }
}

/// Serializes one value against its [`Target`].
struct ValueSerializer<'s, 'o> {
    session: &'s mut EncodeSession<'o>,
    target: Target,
}

impl<'s, 'o> ValueSerializer<'s, 'o> {
    fn scalar(self, text: String) -> Result<Produced> {
        Ok(self.target.scalar(text))
    }

    fn sequence(self, variant: Option<&'static str>) -> Result<SeqFrame<'s, 'o>> {
        self.session.check_depth()?;
        let (item_name, inline_items) = match &self.target.role {
            NodeRole::Array(Some(name)) => (name.clone(), false),
            NodeRole::Array(None) => (DEFAULT_ITEM_NAME.to_string(), true),
            _ => (DEFAULT_ITEM_NAME.to_string(), false),
        };
        Ok(SeqFrame {
            session: self.session,
            target: self.target,
            variant,
            item_name,
            inline_items,
            index: 0,
            frame: EncodeFrame::default(),
        })
    }

    fn structure(
        self,
        type_name: Option<&'static str>,
        variant: Option<&'static str>,
    ) -> Result<StructFrame<'s, 'o>> {
        self.session.check_depth()?;
        Ok(StructFrame {
            session: self.session,
            target: self.target,
            type_name,
            variant,
            frame: EncodeFrame::default(),
        })
    }

    fn date<T>(self, value: &T) -> Result<Produced>
    where
        T: ?Sized + Serialize,
    {
        let raw = utils::capture_text(value)?;
        let date = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| XmlCoderError::invalid_value(&self.session.path, e.to_string()))?
            .with_timezone(&Utc);
        let text = convert::format_date(
            &date,
            &self.session.options.date_encoding,
            &self.session.path,
        )?;
        self.scalar(text)
    }
}

impl<'s, 'o> ser::Serializer for ValueSerializer<'s, 'o> {
    type Ok = Produced;
    type Error = XmlCoderError;
    type SerializeSeq = SeqFrame<'s, 'o>;
    type SerializeTuple = SeqFrame<'s, 'o>;
    type SerializeTupleStruct = SeqFrame<'s, 'o>;
    type SerializeTupleVariant = SeqFrame<'s, 'o>;
    type SerializeMap = MapFrame<'s, 'o>;
    type SerializeStruct = StructFrame<'s, 'o>;
    type SerializeStructVariant = StructFrame<'s, 'o>;

    fn serialize_bool(self, v: bool) -> Result<Produced> {
        let text = self.session.options.bool_literals.format(v).to_string();
        self.scalar(text)
    }

    fn serialize_i8(self, v: i8) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<Produced> {
        let digits = self.session.options.float_precision.f32_fraction_digits;
        self.scalar(convert::format_f32(v, digits))
    }

    fn serialize_f64(self, v: f64) -> Result<Produced> {
        let digits = self.session.options.float_precision.f64_fraction_digits;
        self.scalar(convert::format_f64(v, digits))
    }

    fn serialize_char(self, v: char) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<Produced> {
        self.scalar(v.to_string())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Produced> {
        let text = convert::format_data(
            v,
            &self.session.options.data_encoding,
            &self.session.path,
        )?;
        self.scalar(text)
    }

    fn serialize_none(self) -> Result<Produced> {
        Ok(self.target.nil(self.session.options.nil_encoding))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Produced>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Produced> {
        self.scalar(String::new())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Produced> {
        self.scalar(String::new())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Produced> {
        self.scalar(variant.to_string())
    }

    fn serialize_newtype_struct<T>(mut self, name: &'static str, value: &T) -> Result<Produced>
    where
        T: ?Sized + Serialize,
    {
        if name == DATE_TOKEN {
            return self.date(value);
        }
        if name == INLINE_TOKEN && self.target.inline_item {
            trace!(path = %self.session.path, "inline sequence item");
            self.target.role = NodeRole::InlineText;
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Produced>
    where
        T: ?Sized + Serialize,
    {
        self.session.check_depth()?;
        let inner = value.serialize(ValueSerializer {
            session: &mut *self.session,
            target: Target::element(variant.to_string()),
        })?;
        let mut frame = EncodeFrame::default();
        frame.append(inner, &self.session.path)?;
        self.target.fold(frame, &self.session.path)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.sequence(None)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.sequence(None)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.sequence(None)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.sequence(Some(variant))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(MapFrame {
            inner: self.structure(None, None)?,
            pending_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.structure(Some(name), None)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.structure(Some(name), Some(variant))
    }
}

/// Folds a frame, nesting it in an element named after the enum variant
/// first when there is one.
fn finish(
    target: &Target,
    variant: Option<&'static str>,
    frame: EncodeFrame,
    path: &CodingPath,
) -> Result<Produced> {
    trace!(path = %path, name = %target.name, "folding frame");
    match variant {
        None => target.fold(frame, path),
        Some(variant) => {
            let mut outer = EncodeFrame::default();
            outer.append(Target::element(variant.to_string()).fold(frame, path)?, path)?;
            target.fold(outer, path)
        }
    }
}

/// Frame for struct-like values: each member resolves its own key.
struct StructFrame<'s, 'o> {
    session: &'s mut EncodeSession<'o>,
    target: Target,
    type_name: Option<&'static str>,
    variant: Option<&'static str>,
    frame: EncodeFrame,
}

impl StructFrame<'_, '_> {
    fn encode_field<T>(&mut self, key: &str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let field = role::resolve(self.type_name, key, &self.session.options.field_roles);
        self.session
            .path
            .push(PathSegment::Key(field.local_name.clone()));
        let target = self.session.field_target(&field);
        let result = value
            .serialize(ValueSerializer {
                session: &mut *self.session,
                target,
            })
            .and_then(|produced| {
                if field.role == NodeRole::InlineText && matches!(produced, Produced::Nothing) {
                    self.frame.skipped_text = true;
                }
                self.frame.append(produced, &self.session.path)
            });
        self.session.path.pop();
        result
    }

    fn finish(self) -> Result<Produced> {
        finish(&self.target, self.variant, self.frame, &self.session.path)
    }
}

impl ser::SerializeStruct for StructFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_field(key, value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for StructFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_field(key, value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

/// Frame for maps: keys are rendered to text and resolved like field keys.
struct MapFrame<'s, 'o> {
    inner: StructFrame<'s, 'o>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(utils::capture_text(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| XmlCoderError::from("map value serialized before its key"))?;
        self.inner.encode_field(&key, value)
    }

    fn end(self) -> Result<Produced> {
        self.inner.finish()
    }
}

/// Frame for sequences: items are named after the wrapper name, or
/// `element`, and may be inline when the sequence allows it.
struct SeqFrame<'s, 'o> {
    session: &'s mut EncodeSession<'o>,
    target: Target,
    variant: Option<&'static str>,
    item_name: String,
    inline_items: bool,
    index: usize,
    frame: EncodeFrame,
}

impl SeqFrame<'_, '_> {
    fn encode_item<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.session.path.push(PathSegment::Index(self.index));
        self.index += 1;
        let target = Target {
            name: self.item_name.clone(),
            role: NodeRole::Element,
            inline_item: self.inline_items,
        };
        let result = value
            .serialize(ValueSerializer {
                session: &mut *self.session,
                target,
            })
            .and_then(|produced| self.frame.append(produced, &self.session.path));
        self.session.path.pop();
        result
    }

    fn finish(self) -> Result<Produced> {
        finish(&self.target, self.variant, self.frame, &self.session.path)
    }
}

impl ser::SerializeSeq for SeqFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_item(value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_item(value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_item(value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqFrame<'_, '_> {
    type Ok = Produced;
    type Error = XmlCoderError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.encode_item(value)
    }

    fn end(self) -> Result<Produced> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    fn encode<T: Serialize>(value: &T) -> XmlElement {
        encode_document(value, &EncoderOptions::default())
            .unwrap()
            .root
    }

    #[derive(Serialize)]
    struct Mixed {
        #[serde(rename = "@id")]
        id: u32,
        #[serde(rename = "$text")]
        text: String,
        child: bool,
    }

    #[test]
    fn test_roles_split_into_attributes_text_and_children() {
        let root = encode(&Mixed {
            id: 7,
            text: "hello".to_string(),
            child: true,
        });
        assert_eq!(root.attribute("id"), Some("7"));
        assert_eq!(root.children[0], XmlNode::Text("hello".to_string()));
        assert_eq!(
            root.children[1],
            XmlNode::Element(XmlElement::new("child").with_text("1"))
        );
    }

    #[test]
    fn test_scalar_root() {
        let root = encode(&42u8);
        assert_eq!(root, XmlElement::new("root").with_text("42"));
    }

    #[test]
    fn test_nil_root_is_an_empty_document() {
        let root = encode(&None::<u8>);
        assert_eq!(root, XmlElement::new("root"));
    }

    #[derive(Serialize)]
    struct Deep {
        next: Option<Box<Deep>>,
    }

    #[test]
    fn test_depth_limit() {
        let mut value = Deep { next: None };
        for _ in 0..10 {
            value = Deep {
                next: Some(Box::new(value)),
            };
        }
        let options = EncoderOptions::default().with_max_depth(4);
        let err = encode_document(&value, &options).unwrap_err();
        assert!(matches!(err, XmlCoderError::InvalidValue { .. }));
        assert_eq!(err.path().map(|p| p.len()), Some(4));
    }

    #[derive(Serialize)]
    struct BadAttribute {
        #[serde(rename = "@nested")]
        nested: Mixed,
    }

    #[test]
    fn test_composite_attribute_is_rejected() {
        let value = BadAttribute {
            nested: Mixed {
                id: 1,
                text: String::new(),
                child: false,
            },
        };
        let err = encode_document(&value, &EncoderOptions::default()).unwrap_err();
        assert_eq!(err.path().map(|p| p.to_string()).as_deref(), Some("nested"));
    }
}
