//! # xmlcoder
//!
//! Maps typed Rust values to and from XML element trees through serde.
//!
//! Plain hierarchical formats only know "field contains value". XML has more
//! shapes than that, and this crate lets each field pick one:
//!
//! - a child element (the default),
//! - an attribute on the parent (`@name`),
//! - a bare text run interleaved with sibling elements (`$text`),
//! - a repeated-element sequence with a configurable item name (`name[item]`).
//!
//! Roles are read from the serialized field key, so `#[serde(rename = "...")]`
//! is all a type needs. Types whose keys cannot be changed can be annotated
//! from the outside with a [`RoleTable`].
//!
//! ## Architecture
//!
//! - **Tree** ([`tree`]): an owned element tree, parsed and written with
//!   `quick-xml`.
//! - **Encode** ([`xml::ser`]): a `Serializer` that builds the tree bottom-up,
//!   one frame per composite value, and allocates namespace prefixes.
//! - **Decode** ([`xml::de`]): a `Deserializer` that partitions each element's
//!   children by role and replays them into the value.
//! - **Scalars** ([`convert`]): booleans, numbers, dates and binary data go
//!   through configurable string conversions.
//!
//! ## Examples
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use xmlcoder::{EncoderOptions, XmlEncoder};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Note {
//!     #[serde(rename = "@lang")]
//!     lang: String,
//!     #[serde(rename = "$text")]
//!     body: String,
//! }
//!
//! let note = Note { lang: "en".into(), body: "hello".into() };
//! let encoder = XmlEncoder::with_options(EncoderOptions::default().with_root_name("note"));
//! let xml = encoder.to_string(&note)?;
//! assert_eq!(xml, r#"<note lang="en">hello</note>"#);
//!
//! let back: Note = xmlcoder::from_xml_str(&xml)?;
//! assert_eq!(back, note);
//! # Ok::<(), xmlcoder::XmlCoderError>(())
//! ```

pub mod coder;
pub mod convert;
pub mod error;
pub mod namespace;
pub mod options;
pub mod path;
pub mod role;
pub mod tree;
pub mod xml;

// Re-export common types and functions
pub use coder::{XmlDecoder, XmlEncoder};
pub use error::{Result, XmlCoderError};
pub use options::{
    BoolLiterals, CoderConfig, DataDecodingStrategy, DataEncodingStrategy, DateDecodingStrategy,
    DateEncodingStrategy, DecoderOptions, EncoderOptions, FloatPrecision, KeyCodingStrategy,
    NilStrategy,
};
pub use path::{CodingPath, PathSegment};
pub use role::{FieldAnnotation, FieldKey, NodeRole, RoleTable};
pub use tree::{WriteOptions, XmlDocument, XmlElement, XmlNode};
pub use xml::{
    from_xml_reader, from_xml_slice, from_xml_str, to_xml_string, to_xml_vec, to_xml_writer,
};
pub use xmlcoder_support::{Binary, Date, Inline};
