//! Serde bridge between typed values and the XML tree.
//!
//! - **Serialization** ([`ser`]): a custom `Serializer` receives serialize
//!   calls as a value's `Serialize` impl walks it and builds an
//!   [`XmlElement`](crate::tree::XmlElement) tree bottom-up. Each field's key
//!   is resolved to a role (element, attribute, inline text, array) before
//!   its value is encoded.
//!
//! - **Deserialization** ([`de`]): a custom `Deserializer` walks a parsed
//!   [`XmlDocument`](crate::tree::XmlDocument), partitions each element's
//!   children by role once, and hands fields to the value's `Deserialize` impl.
//!
//! ## Field mapping
//!
//! | Rust field                                      | XML                                  |
//! |-------------------------------------------------|--------------------------------------|
//! | `n: u32`                                        | `<n>42</n>`                          |
//! | `#[serde(rename = "@id")] id: u32`              | `id="42"` on the parent              |
//! | `#[serde(rename = "$text")] text: String`       | bare text inside the parent          |
//! | `items: Vec<String>`                            | `<items><element>a</element></items>`|
//! | `#[serde(rename = "children[child]")] c: Vec<T>`| `<children><child>..</child></children>` |
//! | `#[serde(rename = "{urn:x}n")] n: u32`          | `<ns1:n>42</ns1:n>`, `xmlns:ns1="urn:x"` on the root |
//!
//! ## Namespaces
//!
//! Prefixes are allocated per encode call, in first-use order (`ns1`, `ns2`,
//! ...), and every binding is declared on the root element. Decoding resolves
//! the prefixes the document itself declares.

pub mod de;
pub mod ser;
mod utils;

// Re-export serialization functions
pub use ser::{encode_document, to_xml_string, to_xml_vec, to_xml_writer};

// Re-export deserialization functions
pub use de::{decode_document, from_xml_reader, from_xml_slice, from_xml_str};
