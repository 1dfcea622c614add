//! Helpers shared by the serializer and deserializer.

use crate::error::{Result, XmlCoderError};
use serde::ser::{self, Impossible, Serialize};

/// Name used for sequence items that carry no explicit wrapper name.
pub const DEFAULT_ITEM_NAME: &str = "element";

/// Renders a scalar value (a map key, the payload of a date wrapper) as text.
pub fn capture_text<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    value.serialize(TextCapture)
}

/// Writes `prefix:local`, or just `local` without a prefix.
pub fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

struct TextCapture;

fn not_text(kind: &str) -> XmlCoderError {
    XmlCoderError::from(format!("expected a scalar that renders as text, found {}", kind))
}

impl ser::Serializer for TextCapture {
    type Ok = String;
    type Error = XmlCoderError;
    type SerializeSeq = Impossible<String, XmlCoderError>;
    type SerializeTuple = Impossible<String, XmlCoderError>;
    type SerializeTupleStruct = Impossible<String, XmlCoderError>;
    type SerializeTupleVariant = Impossible<String, XmlCoderError>;
    type SerializeMap = Impossible<String, XmlCoderError>;
    type SerializeStruct = Impossible<String, XmlCoderError>;
    type SerializeStructVariant = Impossible<String, XmlCoderError>;

    fn serialize_bool(self, v: bool) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(not_text("bytes"))
    }

    fn serialize_none(self) -> Result<String> {
        Err(not_text("none"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String> {
        Err(not_text("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String> {
        Err(not_text(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Err(not_text(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(not_text("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(not_text("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(not_text(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(not_text(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(not_text("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(not_text(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(not_text(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    enum Color {
        Red,
    }

    #[derive(Serialize)]
    struct Id(u32);

    #[derive(Serialize)]
    struct Point {
        x: i32,
    }

    #[test]
    fn test_capture_scalars() {
        assert_eq!(capture_text("key").unwrap(), "key");
        assert_eq!(capture_text(&7u8).unwrap(), "7");
        assert_eq!(capture_text(&'x').unwrap(), "x");
        assert_eq!(capture_text(&Color::Red).unwrap(), "Red");
        assert_eq!(capture_text(&Id(3)).unwrap(), "3");
    }

    #[test]
    fn test_capture_rejects_composites() {
        assert!(capture_text(&Point { x: 1 }).is_err());
        assert!(capture_text(&vec![1, 2]).is_err());
        assert!(capture_text(&None::<u8>).is_err());
    }

    #[test]
    fn test_qualified() {
        assert_eq!(qualified(Some("ns1"), "item"), "ns1:item");
        assert_eq!(qualified(None, "item"), "item");
    }
}
