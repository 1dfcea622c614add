//! Configured encoder and decoder handles.

use crate::error::Result;
use crate::options::{CoderConfig, DecoderOptions, EncoderOptions};
use crate::tree::{self, XmlDocument};
use crate::xml::{decode_document, encode_document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};

/// Encodes values with a fixed set of [`EncoderOptions`].
///
/// Each call runs in its own session: namespace prefixes allocated by one
/// call never leak into the next.
#[derive(Debug, Clone, Default)]
pub struct XmlEncoder {
    options: EncoderOptions,
}

impl XmlEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EncoderOptions) -> Self {
        XmlEncoder { options }
    }

    pub fn from_config(config: &CoderConfig) -> Self {
        Self::with_options(config.encoder_options())
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Builds the element tree without rendering it.
    pub fn encode<T>(&self, value: &T) -> Result<XmlDocument>
    where
        T: Serialize + ?Sized,
    {
        encode_document(value, &self.options)
    }

    pub fn to_string<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        self.encode(value)?.to_xml_string(&self.options.write)
    }

    pub fn to_vec<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        self.encode(value)?.to_xml_vec(&self.options.write)
    }

    pub fn to_writer<W, T>(&self, writer: W, value: &T) -> Result<()>
    where
        W: Write,
        T: Serialize + ?Sized,
    {
        self.encode(value)?.write_to(writer, &self.options.write)
    }
}

/// Decodes values with a fixed set of [`DecoderOptions`].
#[derive(Debug, Clone, Default)]
pub struct XmlDecoder {
    options: DecoderOptions,
}

impl XmlDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        XmlDecoder { options }
    }

    pub fn from_config(config: &CoderConfig) -> Self {
        Self::with_options(config.decoder_options())
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn decode<T>(&self, document: &XmlDocument) -> Result<T>
    where
        T: DeserializeOwned,
    {
        decode_document(document, &self.options)
    }

    pub fn from_str<T>(&self, xml: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.decode(&XmlDocument::parse_with_max_depth(xml, self.options.max_depth)?)
    }

    pub fn from_slice<T>(&self, xml: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.from_str(tree::utf8(xml)?)
    }

    pub fn from_reader<R, T>(&self, mut reader: R) -> Result<T>
    where
        R: Read,
        T: DeserializeOwned,
    {
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        self.from_str(&xml)
    }
}
