//! Encoder and decoder configuration.
//!
//! [`EncoderOptions`] and [`DecoderOptions`] are immutable for the length of
//! one call and are threaded by reference through the whole tree walk. Both
//! have a `Default` matching the conventional XML coder behaviour (`0`/`1`
//! booleans, missing-node nils, ISO 8601 dates, Base64 binary, a `root`
//! element) and chainable `with_*` setters. [`CoderConfig`] is the plain-data
//! subset that can be loaded from a configuration file.

use crate::path::CodingPath;
use crate::role::{FieldAnnotation, RoleTable};
use crate::tree::WriteOptions;
use chrono::{DateTime, Utc};
use heck::ToSnakeCase;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Nesting limit applied when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 256;

pub type KeyTransform = Arc<dyn Fn(&CodingPath) -> String + Send + Sync>;
pub type DateFormatter = Arc<dyn Fn(&DateTime<Utc>) -> Result<String, String> + Send + Sync>;
pub type DateParser = Arc<dyn Fn(&str) -> Result<DateTime<Utc>, String> + Send + Sync>;
pub type DataFormatter = Arc<dyn Fn(&[u8]) -> Result<String, String> + Send + Sync>;
pub type DataParser = Arc<dyn Fn(&str) -> Result<Vec<u8>, String> + Send + Sync>;

/// How an absent optional value is represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NilStrategy {
    /// Omit the node; on decode an absent node is nil
    #[default]
    Missing,
    /// Emit an empty element or attribute; on decode empty text is nil
    Empty,
}

/// The literal pair used for booleans.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoolLiterals {
    pub false_value: String,
    pub true_value: String,
}

impl BoolLiterals {
    pub fn new(false_value: impl Into<String>, true_value: impl Into<String>) -> Self {
        BoolLiterals {
            false_value: false_value.into(),
            true_value: true_value.into(),
        }
    }

    pub fn format(&self, value: bool) -> &str {
        if value {
            &self.true_value
        } else {
            &self.false_value
        }
    }

    /// Exact match against either literal.
    pub fn parse(&self, text: &str) -> Option<bool> {
        if text == self.true_value {
            Some(true)
        } else if text == self.false_value {
            Some(false)
        } else {
            None
        }
    }
}

impl Default for BoolLiterals {
    fn default() -> Self {
        BoolLiterals::new("0", "1")
    }
}

/// Renaming applied to element and attribute keys.
#[derive(Clone, Default)]
pub enum KeyCodingStrategy {
    #[default]
    UseDefaultKeys,
    /// `oneTwoThree` becomes `one_two_three`
    ConvertToSnakeCase,
    /// Receives the full coding path, ending with the key, and returns the
    /// name to use in its place
    Custom(KeyTransform),
}

impl KeyCodingStrategy {
    pub fn custom<F>(transform: F) -> Self
    where
        F: Fn(&CodingPath) -> String + Send + Sync + 'static,
    {
        KeyCodingStrategy::Custom(Arc::new(transform))
    }

    /// Name for `key`; `path` already ends with it.
    pub(crate) fn apply(&self, path: &CodingPath, key: &str) -> String {
        match self {
            KeyCodingStrategy::UseDefaultKeys => key.to_string(),
            KeyCodingStrategy::ConvertToSnakeCase => convert_to_snake_case(key),
            KeyCodingStrategy::Custom(transform) => transform(path),
        }
    }
}

impl fmt::Debug for KeyCodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCodingStrategy::UseDefaultKeys => f.write_str("UseDefaultKeys"),
            KeyCodingStrategy::ConvertToSnakeCase => f.write_str("ConvertToSnakeCase"),
            KeyCodingStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Snake-cases `key`, keeping any leading and trailing underscores.
pub fn convert_to_snake_case(key: &str) -> String {
    let body = key.trim_matches('_');
    if body.is_empty() {
        return key.to_string();
    }
    let leading = key.len() - key.trim_start_matches('_').len();
    let trailing = key.len() - key.trim_end_matches('_').len();
    format!(
        "{}{}{}",
        &key[..leading],
        body.to_snake_case(),
        &key[key.len() - trailing..]
    )
}

#[derive(Clone, Default)]
pub enum DateEncodingStrategy {
    /// `1970-01-01T00:00:00Z`
    #[default]
    Iso8601,
    /// A chrono `strftime`-style format string
    Formatted(String),
    Custom(DateFormatter),
}

impl DateEncodingStrategy {
    pub fn custom<F>(format: F) -> Self
    where
        F: Fn(&DateTime<Utc>) -> Result<String, String> + Send + Sync + 'static,
    {
        DateEncodingStrategy::Custom(Arc::new(format))
    }
}

#[derive(Clone, Default)]
pub enum DateDecodingStrategy {
    /// RFC 3339
    #[default]
    Iso8601,
    /// A chrono `strftime`-style format string; a format without an offset is
    /// read as UTC
    Formatted(String),
    Custom(DateParser),
}

impl DateDecodingStrategy {
    pub fn custom<F>(parse: F) -> Self
    where
        F: Fn(&str) -> Result<DateTime<Utc>, String> + Send + Sync + 'static,
    {
        DateDecodingStrategy::Custom(Arc::new(parse))
    }
}

#[derive(Clone, Default)]
pub enum DataEncodingStrategy {
    #[default]
    Base64,
    Hex {
        uppercase: bool,
    },
    Custom(DataFormatter),
}

impl DataEncodingStrategy {
    pub fn custom<F>(format: F) -> Self
    where
        F: Fn(&[u8]) -> Result<String, String> + Send + Sync + 'static,
    {
        DataEncodingStrategy::Custom(Arc::new(format))
    }
}

#[derive(Clone, Default)]
pub enum DataDecodingStrategy {
    #[default]
    Base64,
    /// Either letter case
    Hex,
    Custom(DataParser),
}

impl DataDecodingStrategy {
    pub fn custom<F>(parse: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        DataDecodingStrategy::Custom(Arc::new(parse))
    }
}

impl fmt::Debug for DateEncodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateEncodingStrategy::Iso8601 => f.write_str("Iso8601"),
            DateEncodingStrategy::Formatted(format) => write!(f, "Formatted({:?})", format),
            DateEncodingStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Debug for DateDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateDecodingStrategy::Iso8601 => f.write_str("Iso8601"),
            DateDecodingStrategy::Formatted(format) => write!(f, "Formatted({:?})", format),
            DateDecodingStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Debug for DataEncodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataEncodingStrategy::Base64 => f.write_str("Base64"),
            DataEncodingStrategy::Hex { uppercase } => {
                write!(f, "Hex {{ uppercase: {} }}", uppercase)
            }
            DataEncodingStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Debug for DataDecodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataDecodingStrategy::Base64 => f.write_str("Base64"),
            DataDecodingStrategy::Hex => f.write_str("Hex"),
            DataDecodingStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Upper bound on fractional digits written for floats.
///
/// Output is the shortest text that reads back to the same value; the bound
/// only rounds values whose shortest form is longer. The defaults cover the
/// smallest subnormals, so every finite value round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatPrecision {
    pub f32_fraction_digits: usize,
    pub f64_fraction_digits: usize,
}

impl Default for FloatPrecision {
    fn default() -> Self {
        FloatPrecision {
            f32_fraction_digits: 64,
            f64_fraction_digits: 340,
        }
    }
}

/// Settings for one encode call.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub key_encoding: KeyCodingStrategy,
    /// Overrides `key_encoding` for element names
    pub element_name_encoding: Option<KeyCodingStrategy>,
    /// Overrides `key_encoding` for attribute names
    pub attribute_name_encoding: Option<KeyCodingStrategy>,
    pub nil_encoding: NilStrategy,
    pub bool_literals: BoolLiterals,
    pub date_encoding: DateEncodingStrategy,
    pub data_encoding: DataEncodingStrategy,
    pub float_precision: FloatPrecision,
    pub default_namespace: Option<String>,
    /// URI → prefix pairs declared on every document
    pub namespace_map: BTreeMap<String, String>,
    /// Stem for generated prefixes (`ns` gives `ns1`, `ns2`, ...)
    pub namespace_prefix: String,
    pub root_name: String,
    pub field_roles: RoleTable,
    pub max_depth: usize,
    pub write: WriteOptions,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            key_encoding: KeyCodingStrategy::default(),
            element_name_encoding: None,
            attribute_name_encoding: None,
            nil_encoding: NilStrategy::default(),
            bool_literals: BoolLiterals::default(),
            date_encoding: DateEncodingStrategy::default(),
            data_encoding: DataEncodingStrategy::default(),
            float_precision: FloatPrecision::default(),
            default_namespace: None,
            namespace_map: BTreeMap::new(),
            namespace_prefix: default_namespace_prefix(),
            root_name: default_root_name(),
            field_roles: RoleTable::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            write: WriteOptions::default(),
        }
    }
}

impl EncoderOptions {
    pub fn with_key_encoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.key_encoding = strategy;
        self
    }

    pub fn with_element_name_encoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.element_name_encoding = Some(strategy);
        self
    }

    pub fn with_attribute_name_encoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.attribute_name_encoding = Some(strategy);
        self
    }

    pub fn with_nil_encoding(mut self, strategy: NilStrategy) -> Self {
        self.nil_encoding = strategy;
        self
    }

    pub fn with_bool_literals(mut self, literals: BoolLiterals) -> Self {
        self.bool_literals = literals;
        self
    }

    pub fn with_date_encoding(mut self, strategy: DateEncodingStrategy) -> Self {
        self.date_encoding = strategy;
        self
    }

    pub fn with_data_encoding(mut self, strategy: DataEncodingStrategy) -> Self {
        self.data_encoding = strategy;
        self
    }

    pub fn with_float_precision(mut self, precision: FloatPrecision) -> Self {
        self.float_precision = precision;
        self
    }

    pub fn with_default_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_namespace = Some(uri.into());
        self
    }

    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.namespace_map.insert(uri.into(), prefix.into());
        self
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    pub fn with_field_role(
        mut self,
        type_name: impl Into<String>,
        key: impl Into<String>,
        annotation: impl Into<FieldAnnotation>,
    ) -> Self {
        self.field_roles.insert(type_name, key, annotation);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    pub(crate) fn element_names(&self) -> &KeyCodingStrategy {
        self.element_name_encoding
            .as_ref()
            .unwrap_or(&self.key_encoding)
    }

    pub(crate) fn attribute_names(&self) -> &KeyCodingStrategy {
        self.attribute_name_encoding
            .as_ref()
            .unwrap_or(&self.key_encoding)
    }
}

/// Settings for one decode call.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    pub key_decoding: KeyCodingStrategy,
    /// Overrides `key_decoding` for element names
    pub element_name_decoding: Option<KeyCodingStrategy>,
    /// Overrides `key_decoding` for attribute names
    pub attribute_name_decoding: Option<KeyCodingStrategy>,
    pub nil_decoding: NilStrategy,
    pub bool_literals: BoolLiterals,
    pub date_decoding: DateDecodingStrategy,
    pub data_decoding: DataDecodingStrategy,
    pub default_namespace: Option<String>,
    /// Name the root element must carry, if set
    pub root_tag: Option<String>,
    pub field_roles: RoleTable,
    pub max_depth: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            key_decoding: KeyCodingStrategy::default(),
            element_name_decoding: None,
            attribute_name_decoding: None,
            nil_decoding: NilStrategy::default(),
            bool_literals: BoolLiterals::default(),
            date_decoding: DateDecodingStrategy::default(),
            data_decoding: DataDecodingStrategy::default(),
            default_namespace: None,
            root_tag: None,
            field_roles: RoleTable::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderOptions {
    pub fn with_key_decoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.key_decoding = strategy;
        self
    }

    pub fn with_element_name_decoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.element_name_decoding = Some(strategy);
        self
    }

    pub fn with_attribute_name_decoding(mut self, strategy: KeyCodingStrategy) -> Self {
        self.attribute_name_decoding = Some(strategy);
        self
    }

    pub fn with_nil_decoding(mut self, strategy: NilStrategy) -> Self {
        self.nil_decoding = strategy;
        self
    }

    pub fn with_bool_literals(mut self, literals: BoolLiterals) -> Self {
        self.bool_literals = literals;
        self
    }

    pub fn with_date_decoding(mut self, strategy: DateDecodingStrategy) -> Self {
        self.date_decoding = strategy;
        self
    }

    pub fn with_data_decoding(mut self, strategy: DataDecodingStrategy) -> Self {
        self.data_decoding = strategy;
        self
    }

    pub fn with_default_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_namespace = Some(uri.into());
        self
    }

    pub fn with_root_tag(mut self, name: impl Into<String>) -> Self {
        self.root_tag = Some(name.into());
        self
    }

    pub fn with_field_role(
        mut self,
        type_name: impl Into<String>,
        key: impl Into<String>,
        annotation: impl Into<FieldAnnotation>,
    ) -> Self {
        self.field_roles.insert(type_name, key, annotation);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub(crate) fn element_names(&self) -> &KeyCodingStrategy {
        self.element_name_decoding
            .as_ref()
            .unwrap_or(&self.key_decoding)
    }

    pub(crate) fn attribute_names(&self) -> &KeyCodingStrategy {
        self.attribute_name_decoding
            .as_ref()
            .unwrap_or(&self.key_decoding)
    }
}

/// Binary formats selectable from a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataFormat {
    #[default]
    Base64,
    Hex,
    HexLower,
}

/// Key styles selectable from a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    #[default]
    Default,
    SnakeCase,
}

/// File-loadable coder settings.
///
/// Only plain data lives here; closures and role tables are set on the
/// option structs this converts into.
#[derive(Debug, Clone, Deserialize)]
pub struct CoderConfig {
    #[serde(default)]
    pub nil: NilStrategy,

    #[serde(default)]
    pub bool_literals: BoolLiterals,

    /// chrono format for dates; ISO 8601 when unset
    #[serde(default)]
    pub date_format: Option<String>,

    #[serde(default)]
    pub data_format: DataFormat,

    #[serde(default)]
    pub key_style: KeyStyle,

    #[serde(default)]
    pub default_namespace: Option<String>,

    /// URI → prefix
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,

    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    #[serde(default = "default_root_name")]
    pub root_name: String,

    #[serde(default)]
    pub root_tag: Option<String>,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub write: WriteOptions,
}

fn default_namespace_prefix() -> String {
    "ns".to_string()
}

fn default_root_name() -> String {
    "root".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for CoderConfig {
    fn default() -> Self {
        CoderConfig {
            nil: NilStrategy::default(),
            bool_literals: BoolLiterals::default(),
            date_format: None,
            data_format: DataFormat::default(),
            key_style: KeyStyle::default(),
            default_namespace: None,
            namespaces: BTreeMap::new(),
            namespace_prefix: default_namespace_prefix(),
            root_name: default_root_name(),
            root_tag: None,
            max_depth: default_max_depth(),
            write: WriteOptions::default(),
        }
    }
}

impl CoderConfig {
    fn key_strategy(&self) -> KeyCodingStrategy {
        match self.key_style {
            KeyStyle::Default => KeyCodingStrategy::UseDefaultKeys,
            KeyStyle::SnakeCase => KeyCodingStrategy::ConvertToSnakeCase,
        }
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            key_encoding: self.key_strategy(),
            nil_encoding: self.nil,
            bool_literals: self.bool_literals.clone(),
            date_encoding: match &self.date_format {
                Some(format) => DateEncodingStrategy::Formatted(format.clone()),
                None => DateEncodingStrategy::Iso8601,
            },
            data_encoding: match self.data_format {
                DataFormat::Base64 => DataEncodingStrategy::Base64,
                DataFormat::Hex => DataEncodingStrategy::Hex { uppercase: true },
                DataFormat::HexLower => DataEncodingStrategy::Hex { uppercase: false },
            },
            default_namespace: self.default_namespace.clone(),
            namespace_map: self.namespaces.clone(),
            namespace_prefix: self.namespace_prefix.clone(),
            root_name: self.root_name.clone(),
            max_depth: self.max_depth,
            write: self.write,
            ..EncoderOptions::default()
        }
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            key_decoding: self.key_strategy(),
            nil_decoding: self.nil,
            bool_literals: self.bool_literals.clone(),
            date_decoding: match &self.date_format {
                Some(format) => DateDecodingStrategy::Formatted(format.clone()),
                None => DateDecodingStrategy::Iso8601,
            },
            data_decoding: match self.data_format {
                DataFormat::Base64 => DataDecodingStrategy::Base64,
                DataFormat::Hex | DataFormat::HexLower => DataDecodingStrategy::Hex,
            },
            default_namespace: self.default_namespace.clone(),
            root_tag: self.root_tag.clone(),
            max_depth: self.max_depth,
            ..DecoderOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(convert_to_snake_case("oneTwoThree"), "one_two_three");
        assert_eq!(convert_to_snake_case("myURLProperty"), "my_url_property");
        assert_eq!(convert_to_snake_case("_oneTwoThree_"), "_one_two_three_");
        assert_eq!(convert_to_snake_case("already_snake"), "already_snake");
        assert_eq!(convert_to_snake_case("__"), "__");
    }

    #[test]
    fn test_bool_literals() {
        let literals = BoolLiterals::default();
        assert_eq!(literals.format(true), "1");
        assert_eq!(literals.parse("0"), Some(false));
        assert_eq!(literals.parse("true"), None);

        let custom = BoolLiterals::new("no", "yes");
        assert_eq!(custom.parse("yes"), Some(true));
        assert_eq!(custom.parse("1"), None);
    }

    #[test]
    fn test_element_strategy_falls_back_to_key_strategy() {
        let options = EncoderOptions::default()
            .with_key_encoding(KeyCodingStrategy::ConvertToSnakeCase)
            .with_attribute_name_encoding(KeyCodingStrategy::UseDefaultKeys);
        let path = CodingPath::new().child("someKey");
        assert_eq!(options.element_names().apply(&path, "someKey"), "some_key");
        assert_eq!(options.attribute_names().apply(&path, "someKey"), "someKey");
    }

    #[test]
    fn test_custom_key_strategy_sees_full_path() {
        let strategy = KeyCodingStrategy::custom(|path| format!("{}", path).replace('.', "-"));
        let path = CodingPath::new().child("outer").child("inner");
        assert_eq!(strategy.apply(&path, "inner"), "outer-inner");
    }
}
