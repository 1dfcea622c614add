//! # xmlcoder support types
//!
//! Wrapper value types that carry XML-specific capabilities through serde's
//! data model. The `xmlcoder` encoder and decoder recognise them once, at the
//! point where the value is handed over, by a reserved newtype-struct name
//! (or, for [`Binary`], by the `bytes` entry point). Any other serde format
//! sees them as thin, transparent wrappers:
//!
//! | Type        | XML behaviour                                  | JSON behaviour        |
//! |-------------|------------------------------------------------|-----------------------|
//! | `Inline<T>` | array item emitted as bare siblings, not as an `<element>` | same as `T` |
//! | `Date`      | text produced by the configured date strategy  | RFC 3339 string       |
//! | `Binary`    | text produced by the configured binary strategy | array of bytes       |

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// Newtype name reserved for [`Inline`].
pub const INLINE_TOKEN: &str = "$xmlcoder::Inline";

/// Newtype name reserved for [`Date`].
pub const DATE_TOKEN: &str = "$xmlcoder::Date";

/// Marks a sequence item as a bare keyed blob.
///
/// Inside an array field declared as `name[]`, an `Inline<T>` item does not get
/// its own `<element>` wrapper: a composite `T` contributes its fields as
/// sibling elements of the array element and a scalar `T` contributes a bare
/// text run. Everywhere else the wrapper is transparent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inline<T>(pub T);

impl<T> Inline<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Inline<T> {
    fn from(value: T) -> Self {
        Inline(value)
    }
}

impl<T> Deref for Inline<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Serialize> Serialize for Inline<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(INLINE_TOKEN, &self.0)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Inline<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct InlineVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for InlineVisitor<T> {
            type Value = Inline<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an inline sequence item")
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                T::deserialize(deserializer).map(Inline)
            }
        }

        deserializer.deserialize_newtype_struct(INLINE_TOKEN, InlineVisitor(PhantomData))
    }
}

/// A UTC timestamp that the XML coder renders with its date strategy.
///
/// The value crosses serde as an RFC 3339 string with sub-second precision, so
/// formats that know nothing about it still round-trip it losslessly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date(pub DateTime<Utc>);

impl Date {
    /// Parses an RFC 3339 timestamp and normalises it to UTC.
    pub fn parse_rfc3339(text: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(text).map(|dt| Date(dt.with_timezone(&Utc)))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(value: DateTime<Utc>) -> Self {
        Date(value)
    }
}

impl Serialize for Date {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(DATE_TOKEN, &self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DateVisitor;

        impl<'de> Visitor<'de> for DateVisitor {
            type Value = Date;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an RFC 3339 timestamp")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Date::parse_rfc3339(v).map_err(|e| E::custom(format!("invalid date {v:?}: {e}")))
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                let text = String::deserialize(deserializer)?;
                self.visit_str(&text)
            }
        }

        deserializer.deserialize_newtype_struct(DATE_TOKEN, DateVisitor)
    }
}

/// An opaque byte blob that the XML coder renders with its binary strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl From<Vec<u8>> for Binary {
    fn from(value: Vec<u8>) -> Self {
        Binary(value)
    }
}

impl Deref for Binary {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Binary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BinaryVisitor;

        impl<'de> Visitor<'de> for BinaryVisitor {
            type Value = Binary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte buffer")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Binary(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Binary(v))
            }

            // Formats without a native bytes type hand them over as a sequence
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(Binary(bytes))
            }
        }

        deserializer.deserialize_byte_buf(BinaryVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        key: String,
        value: u32,
    }

    #[test]
    fn test_inline_is_transparent_in_json() {
        let item = Inline(Pair {
            key: "one".to_string(),
            value: 1,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, json!({"key": "one", "value": 1}));

        let back: Inline<Pair> = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_date_json_form_is_rfc3339() {
        let date = Date(DateTime::UNIX_EPOCH);
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"1970-01-01T00:00:00Z\"");

        let back: Date = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }

    #[test]
    fn test_date_parse_normalises_offset() {
        let date = Date::parse_rfc3339("1970-01-01T01:00:00+01:00").unwrap();
        assert_eq!(date.0, DateTime::<Utc>::UNIX_EPOCH);
        assert!(Date::parse_rfc3339("yesterday").is_err());
    }

    #[test]
    fn test_binary_from_json_array() {
        let binary: Binary = serde_json::from_str("[66, 0, 255]").unwrap();
        assert_eq!(binary, Binary(vec![0x42, 0x00, 0xff]));
        assert_eq!(&*binary, &[0x42, 0x00, 0xff]);
    }
}
