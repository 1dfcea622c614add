use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use xmlcoder::{
    Binary, BoolLiterals, CoderConfig, DataDecodingStrategy, DataEncodingStrategy, Date,
    DateDecodingStrategy, DateEncodingStrategy, DecoderOptions, EncoderOptions, Inline,
    NilStrategy, Result, WriteOptions, XmlCoderError, XmlDecoder, XmlEncoder, from_xml_str,
    to_xml_string,
};

fn epoch() -> Date {
    Date(Utc.timestamp_opt(0, 0).unwrap())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Event {
    #[serde(rename = "@at")]
    at: Date,
    when: Date,
}

#[test]
fn test_xml_date_iso8601() -> Result<()> {
    let value = Event {
        at: epoch(),
        when: epoch(),
    };

    let xml = to_xml_string(&value)?;
    assert_eq!(
        xml,
        "<root at=\"1970-01-01T00:00:00Z\"><when>1970-01-01T00:00:00Z</when></root>"
    );

    let back: Event = from_xml_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[test]
fn test_xml_date_formatted() -> Result<()> {
    let value = Event {
        at: epoch(),
        when: epoch(),
    };
    let encoder = XmlEncoder::with_options(
        EncoderOptions::default()
            .with_date_encoding(DateEncodingStrategy::Formatted("%d/%m/%Y".to_string())),
    );
    let decoder = XmlDecoder::with_options(
        DecoderOptions::default()
            .with_date_decoding(DateDecodingStrategy::Formatted("%d/%m/%Y".to_string())),
    );

    let xml = encoder.to_string(&value)?;
    assert_eq!(xml, "<root at=\"01/01/1970\"><when>01/01/1970</when></root>");

    let back: Event = decoder.from_str(&xml)?;
    assert_eq!(back, value);

    // Text in another format does not read as a date
    let err = decoder
        .from_str::<Event>("<root at=\"1970-01-01\"><when>01/01/1970</when></root>")
        .unwrap_err();
    assert!(matches!(err, XmlCoderError::TypeMismatch { .. }));

    Ok(())
}

#[test]
fn test_xml_date_custom() -> Result<()> {
    let encoder = XmlEncoder::with_options(EncoderOptions::default().with_date_encoding(
        DateEncodingStrategy::custom(|date| Ok(date.timestamp().to_string())),
    ));
    let decoder = XmlDecoder::with_options(DecoderOptions::default().with_date_decoding(
        DateDecodingStrategy::custom(|text| {
            let seconds = text.parse::<i64>().map_err(|e| e.to_string())?;
            DateTime::from_timestamp(seconds, 0).ok_or_else(|| "out of range".to_string())
        }),
    ));

    let value = Event {
        at: epoch(),
        when: Date(Utc.timestamp_opt(86_400, 0).unwrap()),
    };
    let xml = encoder.to_string(&value)?;
    assert_eq!(xml, "<root at=\"0\"><when>86400</when></root>");

    let back: Event = decoder.from_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Blob {
    data: Binary,
    #[serde(rename = "@checksum")]
    checksum: Binary,
}

fn blob() -> Blob {
    Blob {
        data: Binary(vec![0x42, 0x00, 0xFF]),
        checksum: Binary(vec![0xAB]),
    }
}

#[test]
fn test_xml_binary_base64() -> Result<()> {
    let xml = to_xml_string(&blob())?;
    assert_eq!(xml, "<root checksum=\"qw==\"><data>QgD/</data></root>");

    let back: Blob = from_xml_str(&xml)?;
    assert_eq!(back, blob());

    let err = from_xml_str::<Blob>("<root checksum=\"qw==\"><data>not base64!</data></root>")
        .unwrap_err();
    assert!(matches!(err, XmlCoderError::TypeMismatch { .. }));

    Ok(())
}

#[test]
fn test_xml_binary_hex_and_custom() -> Result<()> {
    let encoder = XmlEncoder::with_options(
        EncoderOptions::default().with_data_encoding(DataEncodingStrategy::Hex { uppercase: true }),
    );
    let xml = encoder.to_string(&blob())?;
    assert_eq!(xml, "<root checksum=\"AB\"><data>4200FF</data></root>");

    let decoder = XmlDecoder::with_options(
        DecoderOptions::default().with_data_decoding(DataDecodingStrategy::Hex),
    );
    let back: Blob = decoder.from_str("<root checksum=\"ab\"><data>4200ff</data></root>")?;
    assert_eq!(back, blob());

    let encoder = XmlEncoder::with_options(EncoderOptions::default().with_data_encoding(
        DataEncodingStrategy::custom(|bytes| Ok(format!("{} bytes", bytes.len()))),
    ));
    assert_eq!(
        encoder.to_string(&blob())?,
        "<root checksum=\"1 bytes\"><data>3 bytes</data></root>"
    );

    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Link {
    href: url::Url,
}

#[test]
fn test_xml_url_is_plain_text() -> Result<()> {
    let value = Link {
        href: url::Url::parse("https://swift.org/").unwrap(),
    };

    let xml = to_xml_string(&value)?;
    assert_eq!(xml, "<root><href>https://swift.org/</href></root>");

    let back: Link = from_xml_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Value {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: Value,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Dictionary {
    #[serde(rename = "array[]")]
    array: Vec<Inline<Entry>>,
}

fn entry(key: &str, text: &str) -> Inline<Entry> {
    Inline(Entry {
        key: key.to_string(),
        value: Value {
            kind: "string".to_string(),
            text: text.to_string(),
        },
    })
}

#[test]
fn test_xml_inline_sequence_items() -> Result<()> {
    let value = Dictionary {
        array: vec![entry("one", "value 1"), entry("two", "value 2")],
    };

    let xml = to_xml_string(&value)?;
    assert_eq!(
        xml,
        "<root><array><key>one</key><value type=\"string\">value 1</value>\
         <key>two</key><value type=\"string\">value 2</value></array></root>"
    );

    let back: Dictionary = from_xml_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[test]
fn test_xml_inline_item_must_consume_nodes() {
    let err = from_xml_str::<Dictionary>("<root><array><other>1</other></array></root>")
        .unwrap_err();

    assert!(matches!(err, XmlCoderError::ValueNotFound { .. }));
    assert_eq!(
        err.path().map(|p| p.to_string()).as_deref(),
        Some("array[0]")
    );
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Plain {
    #[serde(rename = "array[]")]
    array: Vec<u8>,
}

#[test]
fn test_xml_unwrapped_items_keep_element_names() -> Result<()> {
    let value = Plain { array: vec![1, 2] };

    let xml = to_xml_string(&value)?;
    assert_eq!(
        xml,
        "<root><array><element>1</element><element>2</element></array></root>"
    );

    let back: Plain = from_xml_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Settings {
    #[serde(rename = "someFlag")]
    some_flag: bool,
    #[serde(rename = "@maxCount")]
    max_count: u8,
    #[serde(rename = "lastSeen")]
    last_seen: Option<String>,
    payload: Binary,
}

#[test]
fn test_xml_coder_config_from_json() -> Result<()> {
    let config: CoderConfig = serde_json::from_str(
        r#"{
            "nil": "empty",
            "bool_literals": { "false_value": "no", "true_value": "yes" },
            "data_format": "hex",
            "key_style": "snake_case",
            "root_name": "config",
            "root_tag": "config"
        }"#,
    )
    .unwrap();
    assert_eq!(config.nil, NilStrategy::Empty);
    assert_eq!(config.bool_literals, BoolLiterals::new("no", "yes"));
    assert_eq!(config.namespace_prefix, "ns");

    let value = Settings {
        some_flag: true,
        max_count: 3,
        last_seen: None,
        payload: Binary(vec![0x0F]),
    };

    let xml = XmlEncoder::from_config(&config).to_string(&value)?;
    assert_eq!(
        xml,
        "<config max_count=\"3\"><some_flag>yes</some_flag><last_seen></last_seen>\
         <payload>0F</payload></config>"
    );

    let back: Settings = XmlDecoder::from_config(&config).from_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[test]
fn test_xml_coder_pretty_print_round_trip() -> Result<()> {
    let value = Settings {
        some_flag: false,
        max_count: 1,
        last_seen: Some("yesterday".to_string()),
        payload: Binary(vec![1, 2, 3]),
    };
    let encoder = XmlEncoder::with_options(
        EncoderOptions::default()
            .with_write_options(WriteOptions::default().with_declaration(true).with_indent(4)),
    );

    let xml = encoder.to_string(&value)?;
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root maxCount=\"1\">"));
    assert!(xml.contains("\n    <someFlag>0</someFlag>\n"));

    let back: Settings = XmlDecoder::new().from_str(&xml)?;
    assert_eq!(back, value);

    Ok(())
}

#[test]
fn test_xml_coder_reader_and_writer() -> Result<()> {
    let value = Settings {
        some_flag: true,
        max_count: 9,
        last_seen: None,
        payload: Binary(Vec::new()),
    };

    let mut buffer = Vec::new();
    XmlEncoder::new().to_writer(&mut buffer, &value)?;
    let back: Settings = XmlDecoder::new().from_reader(buffer.as_slice())?;
    assert_eq!(back, value);

    let bytes = XmlEncoder::new().to_vec(&value)?;
    assert_eq!(bytes, buffer);

    Ok(())
}

#[test]
fn test_xml_coder_document_access() -> Result<()> {
    let document = XmlEncoder::new().encode(&Link {
        href: url::Url::parse("https://swift.org/").unwrap(),
    })?;
    assert_eq!(document.root.name, "root");
    assert_eq!(document.root.child_elements().count(), 1);

    let back: Link = XmlDecoder::new().decode(&document)?;
    assert_eq!(back.href.as_str(), "https://swift.org/");

    Ok(())
}
