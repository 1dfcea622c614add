//! Scalar conversion between Rust values and XML text.
//!
//! Every `parse_*` failure is a [`XmlCoderError::TypeMismatch`] naming the
//! target type and the coding path; formatting failures from user strategies
//! surface as [`XmlCoderError::InvalidValue`].

use crate::error::{Result, XmlCoderError};
use crate::options::{
    BoolLiterals, DataDecodingStrategy, DataEncodingStrategy, DateDecodingStrategy,
    DateEncodingStrategy,
};
use crate::path::CodingPath;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt::{Display, Write as _};
use std::str::FromStr;

const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn mismatch(type_name: &str, text: &str, path: &CodingPath) -> XmlCoderError {
    XmlCoderError::type_mismatch(
        type_name,
        path,
        format!("Expected {} value but found {:?} instead.", type_name, text),
    )
}

pub fn parse_bool(text: &str, literals: &BoolLiterals, path: &CodingPath) -> Result<bool> {
    literals
        .parse(text)
        .ok_or_else(|| mismatch("bool", text, path))
}

/// Exact base-10 parsing with the range check of the target width.
pub fn parse_number<T: FromStr>(text: &str, type_name: &str, path: &CodingPath) -> Result<T> {
    text.parse::<T>().map_err(|_| mismatch(type_name, text, path))
}

pub fn parse_char(text: &str, path: &CodingPath) -> Result<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => Err(mismatch("char", text, path)),
    }
}

pub fn format_f32(value: f32, max_fraction_digits: usize) -> String {
    format_float(value, max_fraction_digits)
}

pub fn format_f64(value: f64, max_fraction_digits: usize) -> String {
    format_float(value, max_fraction_digits)
}

/// Shortest round-trip decimal text, rounded only past the digit bound.
fn format_float<T: Display>(value: T, max_fraction_digits: usize) -> String {
    let text = value.to_string();
    match text.split_once('.') {
        Some((_, fraction)) if fraction.len() > max_fraction_digits => {
            trim_fraction(format!("{:.*}", max_fraction_digits, value))
        }
        _ => text,
    }
}

fn trim_fraction(mut text: String) -> String {
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    text
}

pub fn format_date(
    date: &DateTime<Utc>,
    strategy: &DateEncodingStrategy,
    path: &CodingPath,
) -> Result<String> {
    match strategy {
        DateEncodingStrategy::Iso8601 => Ok(date.format(ISO8601_FORMAT).to_string()),
        DateEncodingStrategy::Formatted(format) => {
            let mut out = String::new();
            write!(out, "{}", date.format(format)).map_err(|_| {
                XmlCoderError::invalid_value(path, format!("invalid date format {:?}", format))
            })?;
            Ok(out)
        }
        DateEncodingStrategy::Custom(format) => {
            format(date).map_err(|message| XmlCoderError::invalid_value(path, message))
        }
    }
}

pub fn parse_date(
    text: &str,
    strategy: &DateDecodingStrategy,
    path: &CodingPath,
) -> Result<DateTime<Utc>> {
    match strategy {
        DateDecodingStrategy::Iso8601 => DateTime::parse_from_rfc3339(text)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|_| mismatch("Date", text, path)),
        DateDecodingStrategy::Formatted(format) => DateTime::parse_from_str(text, format)
            .map(|date| date.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(text, format).map(|date| date.and_utc()))
            .or_else(|_| {
                NaiveDate::parse_from_str(text, format)
                    .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            })
            .map_err(|_| mismatch("Date", text, path)),
        DateDecodingStrategy::Custom(parse) => parse(text)
            .map_err(|message| XmlCoderError::type_mismatch("Date", path, message)),
    }
}

pub fn format_data(
    bytes: &[u8],
    strategy: &DataEncodingStrategy,
    path: &CodingPath,
) -> Result<String> {
    match strategy {
        DataEncodingStrategy::Base64 => Ok(STANDARD.encode(bytes)),
        DataEncodingStrategy::Hex { uppercase: true } => Ok(hex::encode_upper(bytes)),
        DataEncodingStrategy::Hex { uppercase: false } => Ok(hex::encode(bytes)),
        DataEncodingStrategy::Custom(format) => {
            format(bytes).map_err(|message| XmlCoderError::invalid_value(path, message))
        }
    }
}

pub fn parse_data(
    text: &str,
    strategy: &DataDecodingStrategy,
    path: &CodingPath,
) -> Result<Vec<u8>> {
    match strategy {
        DataDecodingStrategy::Base64 => STANDARD
            .decode(text)
            .map_err(|_| mismatch("Data", text, path)),
        DataDecodingStrategy::Hex => hex::decode(text).map_err(|_| mismatch("Data", text, path)),
        DataDecodingStrategy::Custom(parse) => parse(text)
            .map_err(|message| XmlCoderError::type_mismatch("Data", path, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> CodingPath {
        CodingPath::new().child("field")
    }

    #[test]
    fn test_float_formatting_never_uses_exponents() {
        assert_eq!(format_f32(1e-10, 64), "0.0000000001");
        assert_eq!(format_f64(1e-15, 340), "0.000000000000001");
        assert_eq!(format_f64(42.0, 340), "42");
        assert_eq!(format_f64(-0.5, 340), "-0.5");
        assert_eq!(format_f64(1e21, 340), "1000000000000000000000");
    }

    #[test]
    fn test_float_round_trip_is_exact() {
        for value in [1e-10, 0.1 + 0.2, f64::MIN_POSITIVE, 123456.789e-300, f64::MAX] {
            let text = format_f64(value, 340);
            let back: f64 = parse_number(&text, "f64", &path()).unwrap();
            assert_eq!(back.to_bits(), value.to_bits(), "{}", text);
        }
    }

    #[test]
    fn test_float_bound_rounds_and_trims() {
        assert_eq!(format_f64(0.123456, 3), "0.123");
        assert_eq!(format_f64(0.1000001, 3), "0.1");
        assert_eq!(format_f64(0.0001, 2), "0");
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(parse_number::<u8>("255", "u8", &path()).unwrap(), 255);
        let err = parse_number::<u8>("256", "u8", &path()).unwrap_err();
        match err {
            XmlCoderError::TypeMismatch { expected, path, .. } => {
                assert_eq!(expected, "u8");
                assert_eq!(path.to_string(), "field");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_number::<i32>(" 1", "i32", &path()).is_err());
    }

    #[test]
    fn test_bool_rejects_other_literals() {
        let literals = BoolLiterals::default();
        assert!(parse_bool("1", &literals, &path()).unwrap());
        assert!(parse_bool("true", &literals, &path()).is_err());
    }

    #[test]
    fn test_char() {
        assert_eq!(parse_char("é", &path()).unwrap(), 'é');
        assert!(parse_char("", &path()).is_err());
        assert!(parse_char("ab", &path()).is_err());
    }

    #[test]
    fn test_dates() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let text = format_date(&epoch, &DateEncodingStrategy::Iso8601, &path()).unwrap();
        assert_eq!(text, "1970-01-01T00:00:00Z");
        assert_eq!(
            parse_date(&text, &DateDecodingStrategy::Iso8601, &path()).unwrap(),
            epoch
        );

        let formatted = DateEncodingStrategy::Formatted("%d/%m/%Y".to_string());
        assert_eq!(format_date(&epoch, &formatted, &path()).unwrap(), "01/01/1970");
        let parsed = parse_date(
            "01/01/1970",
            &DateDecodingStrategy::Formatted("%d/%m/%Y".to_string()),
            &path(),
        )
        .unwrap();
        assert_eq!(parsed, epoch);

        assert!(parse_date("not a date", &DateDecodingStrategy::Iso8601, &path()).is_err());
    }

    #[test]
    fn test_data() {
        let bytes = [0x42, 0x00, 0xff];
        assert_eq!(
            format_data(&bytes, &DataEncodingStrategy::Base64, &path()).unwrap(),
            "QgD/"
        );
        assert_eq!(
            format_data(&bytes, &DataEncodingStrategy::Hex { uppercase: true }, &path()).unwrap(),
            "4200FF"
        );
        assert_eq!(
            format_data(&bytes, &DataEncodingStrategy::Hex { uppercase: false }, &path()).unwrap(),
            "4200ff"
        );
        assert_eq!(
            parse_data("4200fF", &DataDecodingStrategy::Hex, &path()).unwrap(),
            bytes
        );
        assert!(parse_data("420", &DataDecodingStrategy::Hex, &path()).is_err());
        assert!(parse_data("Qg*", &DataDecodingStrategy::Base64, &path()).is_err());
    }
}
