//! Decode tree walker.
//!
//! A custom `serde::Deserializer` over a parsed [`XmlDocument`]. Each
//! composite value reads from one element: its children are partitioned once
//! into elements (by qualified name), attributes and ordered text runs, and
//! every field then consults the partition its role selects. Inline-text
//! fields consume text runs in order, so several of them can read from one
//! element with interleaved children.
//!
//! Sequences filter the element's children down to the item name. A sequence
//! declared `name[]` additionally lets `Inline<T>` items consume sibling
//! nodes positionally.

use crate::convert;
use crate::error::{Result, XmlCoderError};
use crate::namespace::{NamespaceScope, QName};
use crate::options::{DecoderOptions, NilStrategy};
use crate::path::{CodingPath, PathSegment};
use crate::role::{self, NodeRole};
use crate::tree::{XmlDocument, XmlElement, XmlNode};
use crate::xml::utils::DEFAULT_ITEM_NAME;
use serde::de::value::{StrDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, Visitor};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, trace};
use xmlcoder_support::{DATE_TOKEN, Date, INLINE_TOKEN};

/// Decodes a value from an XML string with default options.
///
/// ```
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Book {
///     #[serde(rename = "@id")]
///     id: u32,
///     title: String,
/// }
///
/// let book: Book = xmlcoder::from_xml_str(r#"<book id="7"><title>Dune</title></book>"#)?;
/// assert_eq!(book.id, 7);
/// assert_eq!(book.title, "Dune");
/// # Ok::<(), xmlcoder::XmlCoderError>(())
/// ```
pub fn from_xml_str<T>(xml: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let document = XmlDocument::parse(xml)?;
    decode_document(&document, &DecoderOptions::default())
}

/// Decodes a value from UTF-8 XML bytes with default options.
pub fn from_xml_slice<T>(xml: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let document = XmlDocument::from_slice(xml)?;
    decode_document(&document, &DecoderOptions::default())
}

/// Decodes a value from an XML reader with default options.
pub fn from_xml_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    let document = XmlDocument::from_reader(reader)?;
    decode_document(&document, &DecoderOptions::default())
}

/// Decodes a value from an already parsed document.
pub fn decode_document<T>(document: &XmlDocument, options: &DecoderOptions) -> Result<T>
where
    T: DeserializeOwned,
{
    let root = &document.root;
    if let Some(expected) = &options.root_tag {
        let (_, local) = root.split_name();
        if root.name != *expected && local != expected {
            return Err(XmlCoderError::UnexpectedRootTag {
                expected: expected.clone(),
                found: root.name.clone(),
            });
        }
    }

    debug!(root = %root.name, "decoding document");
    let ctx = Context {
        options,
        path: CodingPath::new(),
        scope: NamespaceScope::default().enter(root),
    };
    T::deserialize(ElementDeserializer::new(root, NodeRole::Element, ctx))
}

/// Where the walker is: options, coding path and the namespace bindings in
/// scope for the current element.
#[derive(Clone)]
struct Context<'a> {
    options: &'a DecoderOptions,
    path: CodingPath,
    scope: NamespaceScope<'a>,
}

impl<'a> Context<'a> {
    /// Context for `element`, reached from here through `segment`.
    fn descend(&self, segment: impl Into<PathSegment>, element: &'a XmlElement) -> Self {
        Context {
            options: self.options,
            path: self.path.child(segment),
            scope: self.scope.enter(element),
        }
    }

    /// Context for a value with no element of its own (attributes, text).
    fn at(&self, segment: impl Into<PathSegment>) -> Self {
        Context {
            options: self.options,
            path: self.path.child(segment),
            scope: self.scope.clone(),
        }
    }

    fn enter(&self, element: &'a XmlElement) -> Self {
        Context {
            options: self.options,
            path: self.path.clone(),
            scope: self.scope.enter(element),
        }
    }

    fn check_depth(&self) -> Result<()> {
        if self.path.len() >= self.options.max_depth {
            return Err(XmlCoderError::invalid_value(
                &self.path,
                format!(
                    "document nesting exceeds the maximum depth of {}",
                    self.options.max_depth
                ),
            ));
        }
        Ok(())
    }

    fn element_name(&self, element: &'a XmlElement) -> QName {
        self.scope.enter(element).element_name(&element.name)
    }

    /// Whether a child `element` answers to `expected`.
    ///
    /// A key without a namespace also matches an unprefixed element that only
    /// inherited a default namespace from the document.
    fn matches(&self, element: &'a XmlElement, expected: &QName) -> bool {
        let actual = self.element_name(element);
        actual == *expected
            || (expected.namespace.is_none()
                && element.split_name().0.is_none()
                && actual.local == expected.local)
    }

    fn is_nil_text(&self, text: &str) -> bool {
        self.options.nil_decoding == NilStrategy::Empty && text.is_empty()
    }
}

fn is_blank(node: &XmlNode) -> bool {
    matches!(node, XmlNode::Text(text) if text.trim().is_empty())
}

fn visit_date<'de, V>(text: &str, ctx: &Context<'_>, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    let date = convert::parse_date(text, &ctx.options.date_decoding, &ctx.path)?;
    visitor.visit_newtype_struct(StringDeserializer::<XmlCoderError>::new(
        Date(date).to_rfc3339(),
    ))
}

macro_rules! deserialize_number {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<'de>,
            {
                let text = self.scalar_text();
                let value = convert::parse_number::<$ty>(&text, stringify!($ty), &self.ctx.path)?;
                visitor.$visit(value)
            }
        )*
    };
}

/// Scalar entry points shared by element and text deserializers. Both read
/// their text through `scalar_text()`.
macro_rules! deserialize_scalars {
    () => {
        deserialize_number! {
            deserialize_i8 => visit_i8(i8),
            deserialize_i16 => visit_i16(i16),
            deserialize_i32 => visit_i32(i32),
            deserialize_i64 => visit_i64(i64),
            deserialize_i128 => visit_i128(i128),
            deserialize_u8 => visit_u8(u8),
            deserialize_u16 => visit_u16(u16),
            deserialize_u32 => visit_u32(u32),
            deserialize_u64 => visit_u64(u64),
            deserialize_u128 => visit_u128(u128),
            deserialize_f32 => visit_f32(f32),
            deserialize_f64 => visit_f64(f64),
        }

        fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            let text = self.scalar_text();
            visitor.visit_bool(convert::parse_bool(
                &text,
                &self.ctx.options.bool_literals,
                &self.ctx.path,
            )?)
        }

        fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            let text = self.scalar_text();
            visitor.visit_char(convert::parse_char(&text, &self.ctx.path)?)
        }

        fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.visit_string(self.scalar_text())
        }

        fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.visit_string(self.scalar_text())
        }

        fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            self.deserialize_byte_buf(visitor)
        }

        fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            let text = self.scalar_text();
            let bytes =
                convert::parse_data(&text, &self.ctx.options.data_decoding, &self.ctx.path)?;
            visitor.visit_byte_buf(bytes)
        }

        fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.visit_unit()
        }

        fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.visit_unit()
        }

        fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            self.deserialize_str(visitor)
        }

        fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.visit_unit()
        }
    };
}

/// Reads one value out of one element.
struct ElementDeserializer<'a> {
    node: &'a XmlElement,
    /// Role of the field the element was found for; decides item names
    role: NodeRole,
    ctx: Context<'a>,
}

impl<'a> ElementDeserializer<'a> {
    /// `ctx` must already be entered into `node`.
    fn new(node: &'a XmlElement, role: NodeRole, ctx: Context<'a>) -> Self {
        ElementDeserializer { node, role, ctx }
    }

    fn scalar_text(&self) -> String {
        self.node.text()
    }

    fn sequence_state(&self) -> SeqState<'a> {
        let (item_name, allow_inline) = match &self.role {
            NodeRole::Array(Some(name)) => (name.as_str(), false),
            NodeRole::Array(None) => (DEFAULT_ITEM_NAME, true),
            _ => (DEFAULT_ITEM_NAME, false),
        };
        SeqState {
            parent: self.node,
            ctx: self.ctx.clone(),
            item: QName::new(self.ctx.options.default_namespace.as_deref(), item_name),
            allow_inline,
            inline: if allow_inline { None } else { Some(false) },
            cursor: 0,
            index: 0,
        }
    }
}

impl<'de, 'a> de::Deserializer<'de> for ElementDeserializer<'a> {
    type Error = XmlCoderError;

    deserialize_scalars!();

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.node.has_child_elements() || !self.node.attributes.is_empty() {
            self.deserialize_map(visitor)
        } else {
            visitor.visit_string(self.scalar_text())
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.ctx.options.nil_decoding {
            NilStrategy::Empty if self.node.is_empty() => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == DATE_TOKEN {
            return visit_date(&self.scalar_text(), &self.ctx, visitor);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.ctx.check_depth()?;
        let path = self.ctx.path.clone();
        trace!(path = %path, role = ?self.role, "decoding sequence");
        visitor
            .visit_seq(ElementSeqAccess {
                state: self.sequence_state(),
            })
            .map_err(|e| e.with_path(&path))
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.ctx.check_depth()?;
        let path = self.ctx.path.clone();
        visitor
            .visit_map(EntryMapAccess::new(self.node, self.ctx))
            .map_err(|e| e.with_path(&path))
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.ctx.check_depth()?;
        let path = self.ctx.path.clone();
        trace!(path = %path, name, "decoding struct");
        let access = StructAccess {
            index: ElementIndex::build(self.node, &self.ctx),
            ctx: self.ctx,
            type_name: Some(name),
            fields: fields.iter(),
            text_cursor: 0,
            pending: None,
        };
        visitor.visit_map(access).map_err(|e| e.with_path(&path))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.node.child_elements().next() {
            Some(variant) => visitor.visit_enum(ElementVariant {
                node: variant,
                ctx: self.ctx.enter(variant),
            }),
            None => visitor.visit_enum(StringDeserializer::<XmlCoderError>::new(
                self.scalar_text(),
            )),
        }
    }
}

/// An enum variant written as a child element named after the variant.
struct ElementVariant<'a> {
    node: &'a XmlElement,
    ctx: Context<'a>,
}

impl<'de, 'a> de::EnumAccess<'de> for ElementVariant<'a> {
    type Error = XmlCoderError;
    type Variant = ElementDeserializer<'a>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let (_, local) = self.node.split_name();
        let variant = seed.deserialize(StrDeserializer::<XmlCoderError>::new(local))?;
        Ok((
            variant,
            ElementDeserializer::new(self.node, NodeRole::Element, self.ctx),
        ))
    }
}

impl<'de, 'a> de::VariantAccess<'de> for ElementDeserializer<'a> {
    type Error = XmlCoderError;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

/// Reads a value that is plain text: an attribute value, an inline text run,
/// a map key. `None` means no text was there at all.
struct TextDeserializer<'a> {
    text: Option<Cow<'a, str>>,
    ctx: Context<'a>,
}

impl<'a> TextDeserializer<'a> {
    fn new(text: Option<Cow<'a, str>>, ctx: Context<'a>) -> Self {
        TextDeserializer { text, ctx }
    }

    fn scalar_text(&self) -> String {
        self.text.as_deref().unwrap_or_default().to_string()
    }

    fn not_composite<'de, V>(&self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let text = self.text.as_deref().unwrap_or_default();
        Err(de::Error::invalid_type(de::Unexpected::Str(text), &visitor))
    }
}

impl<'de, 'a> de::Deserializer<'de> for TextDeserializer<'a> {
    type Error = XmlCoderError;

    deserialize_scalars!();

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.scalar_text())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.text.as_deref() {
            None => visitor.visit_none(),
            Some(text) if self.ctx.is_nil_text(text) => visitor.visit_none(),
            Some(_) => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == DATE_TOKEN {
            return visit_date(&self.scalar_text(), &self.ctx, visitor);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.not_composite(visitor)
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.not_composite(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.not_composite(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.not_composite(visitor)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.not_composite(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(StringDeserializer::<XmlCoderError>::new(self.scalar_text()))
    }
}

/// A located field value, waiting for `next_value_seed`.
enum FieldValue<'a> {
    Element(&'a XmlElement, NodeRole),
    Text(Option<Cow<'a, str>>),
}

struct PendingField<'a> {
    /// Path segment for the value
    segment: String,
    value: FieldValue<'a>,
}

impl<'a> PendingField<'a> {
    fn deserialize<'de, T>(self, seed: T, parent: &Context<'a>) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        let path = parent.path.child(self.segment.as_str());
        let result = match self.value {
            FieldValue::Element(element, role) => seed.deserialize(ElementDeserializer::new(
                element,
                role,
                parent.descend(self.segment, element),
            )),
            FieldValue::Text(text) => {
                seed.deserialize(TextDeserializer::new(text, parent.at(self.segment)))
            }
        };
        result.map_err(|e| e.with_path(&path))
    }
}

/// One element's children and attributes, partitioned for field lookup.
struct ElementIndex<'a> {
    elements: HashMap<QName, &'a XmlElement>,
    /// Unprefixed children by local name
    unprefixed: HashMap<&'a str, &'a XmlElement>,
    attributes: HashMap<QName, &'a str>,
    texts: Vec<&'a str>,
}

impl<'a> ElementIndex<'a> {
    fn build(node: &'a XmlElement, ctx: &Context<'a>) -> Self {
        let mut index = ElementIndex {
            elements: HashMap::new(),
            unprefixed: HashMap::new(),
            attributes: HashMap::with_capacity(node.attributes.len()),
            texts: Vec::new(),
        };
        // Whitespace between child elements is layout, not content
        let has_elements = node.has_child_elements();
        for child in &node.children {
            match child {
                XmlNode::Element(element) => {
                    index
                        .elements
                        .entry(ctx.element_name(element))
                        .or_insert(element);
                    if element.split_name().0.is_none() {
                        index
                            .unprefixed
                            .entry(element.name.as_str())
                            .or_insert(element);
                    }
                }
                XmlNode::Text(text) if has_elements && text.trim().is_empty() => {}
                XmlNode::Text(text) => index.texts.push(text),
            }
        }
        for attribute in &node.attributes {
            index
                .attributes
                .entry(ctx.scope.attribute_name(&attribute.name))
                .or_insert(attribute.value.as_str());
        }
        index
    }

    fn element(&self, expected: &QName) -> Option<&'a XmlElement> {
        self.elements.get(expected).copied().or_else(|| {
            expected
                .namespace
                .is_none()
                .then(|| self.unprefixed.get(expected.local.as_str()).copied())
                .flatten()
        })
    }
}

/// Field-by-field access to a struct, in declaration order.
struct StructAccess<'a> {
    index: ElementIndex<'a>,
    ctx: Context<'a>,
    type_name: Option<&'static str>,
    fields: std::slice::Iter<'static, &'static str>,
    text_cursor: usize,
    pending: Option<PendingField<'a>>,
}

impl<'a> StructAccess<'a> {
    /// Locates `key`; `None` when the document has no value for it.
    fn locate(&mut self, key: &str) -> Option<PendingField<'a>> {
        let options = self.ctx.options;
        let field = role::resolve(self.type_name, key, &options.field_roles);
        let field_path = self.ctx.path.child(field.local_name.as_str());
        let namespace = field.effective_namespace(options.default_namespace.as_deref());

        let value = match &field.role {
            NodeRole::InlineText => {
                let run = self.index.texts.get(self.text_cursor).copied();
                if run.is_some() {
                    self.text_cursor += 1;
                }
                FieldValue::Text(run.map(Cow::Borrowed))
            }
            NodeRole::Attribute => {
                let local = options
                    .attribute_names()
                    .apply(&field_path, &field.local_name);
                let value = self.index.attributes.get(&QName::new(namespace, &local))?;
                FieldValue::Text(Some(Cow::Borrowed(*value)))
            }
            NodeRole::Element | NodeRole::Array(_) => {
                let local = options
                    .element_names()
                    .apply(&field_path, &field.local_name);
                let element = self.index.element(&QName::new(namespace, &local))?;
                FieldValue::Element(element, field.role.clone())
            }
        };
        Some(PendingField {
            segment: field.local_name,
            value,
        })
    }
}

impl<'de, 'a> de::MapAccess<'de> for StructAccess<'a> {
    type Error = XmlCoderError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        while let Some(key) = self.fields.next() {
            if let Some(pending) = self.locate(key) {
                self.pending = Some(pending);
                return seed
                    .deserialize(StrDeserializer::<XmlCoderError>::new(key))
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| XmlCoderError::from("value requested before its key"))?;
        pending.deserialize(seed, &self.ctx)
    }
}

/// Access to every attribute and child element as map entries.
///
/// Attribute keys carry an `@` prefix and namespaced keys use Clark notation,
/// mirroring the field key syntax. Direct text becomes a `$text` entry.
struct EntryMapAccess<'a> {
    entries: std::vec::IntoIter<(String, PendingField<'a>)>,
    ctx: Context<'a>,
    pending: Option<PendingField<'a>>,
}

impl<'a> EntryMapAccess<'a> {
    fn new(node: &'a XmlElement, ctx: Context<'a>) -> Self {
        let default = ctx.options.default_namespace.as_deref();
        let mut entries = Vec::with_capacity(node.attributes.len() + node.children.len());

        for attribute in &node.attributes {
            let name = ctx.scope.attribute_name(&attribute.name);
            let key = match &name.namespace {
                Some(uri) => format!("@{{{}}}{}", uri, name.local),
                None => format!("@{}", name.local),
            };
            entries.push((
                key,
                PendingField {
                    segment: name.local,
                    value: FieldValue::Text(Some(Cow::Borrowed(attribute.value.as_str()))),
                },
            ));
        }

        let mut text = String::new();
        for child in &node.children {
            match child {
                XmlNode::Element(element) => {
                    let name = ctx.element_name(element);
                    let key = match name.namespace.as_deref() {
                        Some(uri) if Some(uri) != default => format!("{{{}}}{}", uri, name.local),
                        _ => name.local.clone(),
                    };
                    entries.push((
                        key,
                        PendingField {
                            segment: name.local,
                            value: FieldValue::Element(element, NodeRole::Element),
                        },
                    ));
                }
                XmlNode::Text(run) => text.push_str(run),
            }
        }
        if !text.trim().is_empty() {
            entries.push((
                "$text".to_string(),
                PendingField {
                    segment: "text".to_string(),
                    value: FieldValue::Text(Some(Cow::Owned(text))),
                },
            ));
        }

        EntryMapAccess {
            entries: entries.into_iter(),
            ctx,
            pending: None,
        }
    }
}

impl<'de, 'a> de::MapAccess<'de> for EntryMapAccess<'a> {
    type Error = XmlCoderError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, pending)) => {
                let key_ctx = self.ctx.at(pending.segment.as_str());
                self.pending = Some(pending);
                seed.deserialize(TextDeserializer::new(Some(Cow::Owned(key)), key_ctx))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| XmlCoderError::from("value requested before its key"))?;
        pending.deserialize(seed, &self.ctx)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

/// Position of a sequence walk over one element's children.
struct SeqState<'a> {
    parent: &'a XmlElement,
    /// Context of the sequence element itself
    ctx: Context<'a>,
    item: QName,
    allow_inline: bool,
    /// Decided by the first item when `allow_inline` is set
    inline: Option<bool>,
    /// Index into `parent.children`
    cursor: usize,
    /// Items produced so far
    index: usize,
}

impl<'a> SeqState<'a> {
    fn remaining(&self) -> &'a [XmlNode] {
        let children = self.parent.children.as_slice();
        &children[self.cursor.min(children.len())..]
    }

    /// Offset from the cursor and element of the next matching item.
    fn next_item(&self) -> Option<(usize, &'a XmlElement)> {
        self.remaining()
            .iter()
            .enumerate()
            .find_map(|(offset, node)| match node {
                XmlNode::Element(element) if self.ctx.matches(element, &self.item) => {
                    Some((offset, element))
                }
                _ => None,
            })
    }

    fn has_next(&self) -> bool {
        match self.inline {
            Some(false) => self.next_item().is_some(),
            _ => self.remaining().iter().any(|node| !is_blank(node)),
        }
    }

    fn item_path(&self) -> CodingPath {
        self.ctx.path.child(self.index)
    }

    /// Context shared by the nodes an inline item consumes.
    fn inline_context(&self) -> Context<'a> {
        self.ctx.at(self.index)
    }

    fn take_item(&mut self) -> Result<ElementDeserializer<'a>> {
        let (offset, element) = self.next_item().ok_or_else(|| {
            XmlCoderError::value_not_found(
                self.item.local.clone(),
                &self.item_path(),
                format!("Expected <{}> item but found none.", self.item),
            )
        })?;
        self.cursor += offset + 1;
        Ok(ElementDeserializer::new(
            element,
            NodeRole::Element,
            self.ctx.descend(self.index, element),
        ))
    }

    /// The sibling element at the cursor, if it answers to `expected`.
    fn take_element(&mut self, expected: &QName) -> Option<&'a XmlElement> {
        let remaining = self.remaining();
        let offset = remaining.iter().position(|node| !is_blank(node))?;
        match &remaining[offset] {
            XmlNode::Element(element) if self.ctx.matches(element, expected) => {
                self.cursor += offset + 1;
                Some(element)
            }
            _ => None,
        }
    }

    /// The text run at the cursor, if any.
    fn take_text(&mut self) -> Option<&'a str> {
        match self.remaining().first() {
            Some(XmlNode::Text(text)) => {
                self.cursor += 1;
                Some(text.as_str())
            }
            _ => None,
        }
    }
}

struct ElementSeqAccess<'a> {
    state: SeqState<'a>,
}

impl<'de, 'a> de::SeqAccess<'de> for ElementSeqAccess<'a> {
    type Error = XmlCoderError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if !self.state.has_next() {
            return Ok(None);
        }
        let path = self.state.item_path();
        let value = seed
            .deserialize(SeqItemDeserializer {
                state: &mut self.state,
            })
            .map_err(|e| e.with_path(&path))?;
        self.state.index += 1;
        Ok(Some(value))
    }
}

/// Deserializer for one sequence item. Decides between an `<element>` item
/// and an inline item once the item type announces itself.
struct SeqItemDeserializer<'s, 'a> {
    state: &'s mut SeqState<'a>,
}

impl<'a> SeqItemDeserializer<'_, 'a> {
    fn into_element(self) -> Result<ElementDeserializer<'a>> {
        if self.state.inline.is_none() {
            self.state.inline = Some(false);
        }
        self.state.take_item()
    }
}

macro_rules! forward_to_element {
    ($($method:ident)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<'de>,
            {
                self.into_element()?.$method(visitor)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for SeqItemDeserializer<'_, '_> {
    type Error = XmlCoderError;

    forward_to_element! {
        deserialize_any deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32
        deserialize_i64 deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32
        deserialize_u64 deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char
        deserialize_str deserialize_string deserialize_bytes deserialize_byte_buf
        deserialize_option deserialize_unit deserialize_seq deserialize_map
        deserialize_identifier deserialize_ignored_any
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_element()?.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == INLINE_TOKEN && self.state.allow_inline {
            self.state.inline = Some(true);
            let start = self.state.cursor;
            let path = self.state.item_path();
            trace!(path = %path, "decoding inline item");
            let value = visitor.visit_newtype_struct(InlineItemDeserializer {
                state: &mut *self.state,
            })?;
            if self.state.cursor == start {
                return Err(XmlCoderError::value_not_found(
                    "inline item",
                    &path,
                    "Inline sequence item consumed no nodes.",
                ));
            }
            return Ok(value);
        }
        self.into_element()?
            .deserialize_newtype_struct(name, visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_element()?.deserialize_tuple(len, visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_element()?
            .deserialize_tuple_struct(name, len, visitor)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_element()?
            .deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_element()?
            .deserialize_enum(name, variants, visitor)
    }
}

/// Reads an `Inline<T>` item from the sibling nodes at the cursor: a struct
/// consumes matching elements and text runs field by field, a scalar consumes
/// one text run.
struct InlineItemDeserializer<'s, 'a> {
    state: &'s mut SeqState<'a>,
}

impl<'a> InlineItemDeserializer<'_, 'a> {
    fn into_text(self) -> Result<TextDeserializer<'a>> {
        let ctx = self.state.inline_context();
        match self.state.take_text() {
            Some(text) => Ok(TextDeserializer::new(Some(Cow::Borrowed(text)), ctx)),
            None => Err(XmlCoderError::value_not_found(
                "text",
                &ctx.path,
                "Expected an inline text run but found none.",
            )),
        }
    }

    fn not_inline(&self, kind: &str) -> XmlCoderError {
        XmlCoderError::type_mismatch(
            kind,
            &self.state.item_path(),
            format!("A {} cannot be decoded as an inline sequence item.", kind),
        )
    }
}

macro_rules! forward_to_text {
    ($($method:ident)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<'de>,
            {
                self.into_text()?.$method(visitor)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for InlineItemDeserializer<'_, '_> {
    type Error = XmlCoderError;

    forward_to_text! {
        deserialize_any deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32
        deserialize_i64 deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32
        deserialize_u64 deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char
        deserialize_str deserialize_string deserialize_bytes deserialize_byte_buf
        deserialize_unit deserialize_identifier deserialize_ignored_any
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_text()?.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == DATE_TOKEN {
            return self.into_text()?.deserialize_newtype_struct(name, visitor);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(self.not_inline("sequence"))
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(self.not_inline("tuple"))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(self.not_inline("tuple struct"))
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(self.not_inline("map"))
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let ctx = self.state.inline_context();
        ctx.check_depth()?;
        let path = ctx.path.clone();
        visitor
            .visit_map(InlineStructAccess {
                state: self.state,
                ctx,
                type_name: Some(name),
                fields: fields.iter(),
                pending: None,
            })
            .map_err(|e| e.with_path(&path))
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.into_text()?.deserialize_enum(name, variants, visitor)
    }
}

/// Positional field access for an inline struct item.
struct InlineStructAccess<'s, 'a> {
    state: &'s mut SeqState<'a>,
    ctx: Context<'a>,
    type_name: Option<&'static str>,
    fields: std::slice::Iter<'static, &'static str>,
    pending: Option<PendingField<'a>>,
}

impl<'a> InlineStructAccess<'_, 'a> {
    fn locate(&mut self, key: &str) -> Option<PendingField<'a>> {
        let options = self.ctx.options;
        let field = role::resolve(self.type_name, key, &options.field_roles);
        let value = match &field.role {
            NodeRole::InlineText => {
                FieldValue::Text(self.state.take_text().map(Cow::Borrowed))
            }
            // Inline items have no element of their own to carry attributes
            NodeRole::Attribute => return None,
            NodeRole::Element | NodeRole::Array(_) => {
                let field_path = self.ctx.path.child(field.local_name.as_str());
                let local = options
                    .element_names()
                    .apply(&field_path, &field.local_name);
                let namespace = field.effective_namespace(options.default_namespace.as_deref());
                let element = self.state.take_element(&QName::new(namespace, &local))?;
                FieldValue::Element(element, field.role.clone())
            }
        };
        Some(PendingField {
            segment: field.local_name,
            value,
        })
    }
}

impl<'de, 'a> de::MapAccess<'de> for InlineStructAccess<'_, 'a> {
    type Error = XmlCoderError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        while let Some(key) = self.fields.next() {
            if let Some(pending) = self.locate(key) {
                self.pending = Some(pending);
                return seed
                    .deserialize(StrDeserializer::<XmlCoderError>::new(key))
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| XmlCoderError::from("value requested before its key"))?;
        pending.deserialize(seed, &self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn decode<T: DeserializeOwned>(xml: &str) -> Result<T> {
        from_xml_str(xml)
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Mixed {
        #[serde(rename = "@id")]
        id: u32,
        #[serde(rename = "$first")]
        first: String,
        child: bool,
        #[serde(rename = "$second")]
        second: String,
    }

    #[test]
    fn test_partition_by_role() {
        let value: Mixed = decode(r#"<root id="3">one<child>1</child>two</root>"#).unwrap();
        assert_eq!(
            value,
            Mixed {
                id: 3,
                first: "one".to_string(),
                child: true,
                second: "two".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_inline_text_is_empty() {
        let value: Mixed = decode(r#"<root id="3"><child>0</child></root>"#).unwrap();
        assert_eq!(value.first, "");
        assert_eq!(value.second, "");
    }

    #[test]
    fn test_missing_attribute_names_field() {
        let err = decode::<Mixed>("<root><child>0</child></root>").unwrap_err();
        assert!(matches!(err, XmlCoderError::ValueNotFound { .. }));
        assert_eq!(err.message(), "No value associated with key id.");
    }

    #[test]
    fn test_type_mismatch_carries_path() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            #[allow(dead_code)]
            inner: Inner,
        }
        #[derive(Debug, Deserialize)]
        struct Inner {
            #[allow(dead_code)]
            count: u8,
        }

        let err = decode::<Outer>("<root><inner><count>300</count></inner></root>").unwrap_err();
        match err {
            XmlCoderError::TypeMismatch { expected, path, .. } => {
                assert_eq!(expected, "u8");
                assert_eq!(path.to_string(), "inner.count");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sequence_index_in_path() {
        let err = decode::<Vec<u8>>("<root><element>1</element><element>x</element></root>")
            .unwrap_err();
        assert_eq!(err.path().map(|p| p.to_string()).as_deref(), Some("[1]"));
    }

    #[test]
    fn test_unexpected_root_tag() {
        let document = XmlDocument::parse("<other/>").unwrap();
        let options = DecoderOptions::default().with_root_tag("root");
        let err = decode_document::<String>(&document, &options).unwrap_err();
        assert!(matches!(err, XmlCoderError::UnexpectedRootTag { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let xml = "<root><element><element><element>1</element></element></element></root>";
        let document = XmlDocument::parse(xml).unwrap();
        let options = DecoderOptions::default().with_max_depth(2);
        let err = decode_document::<Vec<Vec<Vec<u8>>>>(&document, &options).unwrap_err();
        assert!(matches!(err, XmlCoderError::InvalidValue { .. }));
    }
}
