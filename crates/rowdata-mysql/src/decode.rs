//! Text-protocol cell decoding.
//!
//! In the text protocol every cell arrives as a length-prefixed string and
//! the column's type code decides how it is read. Malformed temporal text
//! is never an error: it resolves to the configured substitute or to the
//! raw text, and the caller is told the cell was malformed.

use std::borrow::Cow;

use rowdata_core::{DecodeError, DecodeErrorKind, Error, Result, Value};

use crate::config::DecoderOptions;
use crate::protocol::RawCell;
use crate::temporal::{self, Temporal};
use crate::types::{ColumnDescriptor, ConverterInput, FieldType};

/// A decoded cell and whether its text was malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCell {
    pub value: Value,
    /// Temporal text that failed validation and was replaced
    pub malformed: bool,
}

impl DecodedCell {
    fn ok(value: Value) -> Self {
        Self {
            value,
            malformed: false,
        }
    }
}

/// Decode one cell of a row.
///
/// A column converter, when present, replaces the default handling for
/// every non-NULL cell.
pub fn decode_cell(
    cell: RawCell<'_>,
    column: &ColumnDescriptor,
    options: &DecoderOptions,
) -> Result<DecodedCell> {
    let Some(bytes) = cell.bytes() else {
        return Ok(DecodedCell::ok(Value::Null));
    };

    if let Some(converter) = &column.converter {
        let value = if column.encoding.is_binary() {
            converter.call(ConverterInput::Bytes(bytes))
        } else {
            let text = decode_text(bytes, column)?;
            converter.call(ConverterInput::Text(&text))
        };
        return value.map(DecodedCell::ok).map_err(|e| converter_error(e, column));
    }

    decode_default(bytes, column, options)
}

/// Default dispatch by field type.
pub fn decode_default(
    bytes: &[u8],
    column: &ColumnDescriptor,
    options: &DecoderOptions,
) -> Result<DecodedCell> {
    let field_type = column.field_type;
    let value = match field_type {
        FieldType::Null => Value::Null,

        FieldType::Decimal | FieldType::NewDecimal => {
            Value::Decimal(String::from_utf8_lossy(bytes).into_owned())
        }

        FieldType::Tiny
        | FieldType::Short
        | FieldType::Int24
        | FieldType::Long
        | FieldType::LongLong
        | FieldType::Year => parse_integer(bytes, column.is_unsigned()),

        FieldType::Float | FieldType::Double => match float_text(bytes).and_then(|s| s.parse().ok()) {
            Some(v) => Value::Double(v),
            None => raw_text(bytes),
        },

        FieldType::DateTime | FieldType::Timestamp | FieldType::DateTime2 | FieldType::Timestamp2 => {
            match temporal::parse_datetime(bytes) {
                Temporal::Zero => Value::Null,
                Temporal::Valid(parts) => match parts.to_naive_datetime() {
                    Some(dt) => Value::DateTime(dt),
                    None => return Ok(malformed(bytes, column, options)),
                },
                Temporal::Invalid => return Ok(malformed(bytes, column, options)),
            }
        }

        FieldType::Date | FieldType::NewDate => match temporal::parse_date(bytes) {
            Temporal::Zero => Value::Null,
            Temporal::Valid(parts) => match parts.to_naive_date() {
                Some(d) => Value::Date(d),
                None => return Ok(malformed(bytes, column, options)),
            },
            Temporal::Invalid => return Ok(malformed(bytes, column, options)),
        },

        FieldType::Time | FieldType::Time2 => match temporal::parse_duration(bytes) {
            Some(parts) => Value::Duration(parts.to_time_delta()),
            None => return Ok(malformed(bytes, column, options)),
        },

        FieldType::Json if options.parse_json && !column.encoding.is_binary() => {
            let text = decode_text(bytes, column)?;
            match serde_json::from_str(&text) {
                Ok(json) => Value::Json(json),
                Err(e) => {
                    tracing::debug!(column = %column.name, error = %e, "JSON cell kept as text");
                    Value::Text(text.into_owned())
                }
            }
        }

        FieldType::Json
        | FieldType::Bit
        | FieldType::Enum
        | FieldType::Set
        | FieldType::TinyBlob
        | FieldType::MediumBlob
        | FieldType::LongBlob
        | FieldType::Blob
        | FieldType::Geometry
        | FieldType::VarChar
        | FieldType::VarString
        | FieldType::String => string_value(bytes, column)?,
    };
    Ok(DecodedCell::ok(value))
}

/// Binary columns pass through; text columns are strictly decoded.
pub fn string_value(bytes: &[u8], column: &ColumnDescriptor) -> Result<Value> {
    if column.encoding.is_binary() {
        return Ok(Value::Bytes(bytes.to_vec()));
    }
    Ok(Value::Text(decode_text(bytes, column)?.into_owned()))
}

fn decode_text<'a>(bytes: &'a [u8], column: &ColumnDescriptor) -> Result<Cow<'a, str>> {
    column.encoding.decode(bytes).ok_or_else(|| {
        Error::Decode(DecodeError {
            kind: DecodeErrorKind::Encoding,
            column: Some(column.name.clone()),
            message: format!(
                "{}-byte cell is not valid {}",
                bytes.len(),
                column.encoding.name()
            ),
            source: None,
        })
    })
}

fn ascii(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

/// `bytes` as text if it is a plain base-10 float: `[+-]digits[.digits]`
/// with an optional `e[+-]digits` exponent. `inf` and `NaN` are refused.
pub fn float_text(bytes: &[u8]) -> Option<&str> {
    fn digits(s: &[u8]) -> usize {
        s.iter().take_while(|b| b.is_ascii_digit()).count()
    }

    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits(&bytes[i..]);
    i += int_digits;
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        frac_digits = digits(&bytes[i..]);
        i += frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        i += usize::from(matches!(bytes.get(i), Some(b'+' | b'-')));
        let exp_digits = digits(&bytes[i..]);
        if exp_digits == 0 {
            return None;
        }
        i += exp_digits;
    }
    if i != bytes.len() {
        return None;
    }
    ascii(bytes)
}

fn raw_text(bytes: &[u8]) -> Value {
    Value::Text(String::from_utf8_lossy(bytes).into_owned())
}

/// Integers that do not parse are kept as text.
fn parse_integer(bytes: &[u8], unsigned: bool) -> Value {
    let Some(text) = ascii(bytes) else {
        return raw_text(bytes);
    };
    if unsigned {
        text.parse::<u64>().map_or_else(|_| raw_text(bytes), Value::from_u64)
    } else {
        text.parse::<i64>().map_or_else(|_| raw_text(bytes), Value::Int)
    }
}

/// Substitute for a malformed temporal cell: the column's own substitute,
/// then the per-type option, then the raw text.
pub fn invalid_substitute<'a>(
    column: &'a ColumnDescriptor,
    options: &'a DecoderOptions,
) -> Option<&'a Value> {
    column
        .invalid_value
        .as_ref()
        .or_else(|| options.invalid_values.get(&column.field_type))
}

fn malformed(bytes: &[u8], column: &ColumnDescriptor, options: &DecoderOptions) -> DecodedCell {
    tracing::debug!(
        column = %column.name,
        field_type = %column.field_type,
        "malformed temporal cell"
    );
    let value = invalid_substitute(column, options)
        .cloned()
        .unwrap_or_else(|| raw_text(bytes));
    DecodedCell {
        value,
        malformed: true,
    }
}

fn converter_error(err: Error, column: &ColumnDescriptor) -> Error {
    match err {
        Error::Decode(mut e) => {
            e.column.get_or_insert_with(|| column.name.clone());
            Error::Decode(e)
        }
        other => Error::Decode(DecodeError {
            kind: DecodeErrorKind::Converter,
            column: Some(column.name.clone()),
            message: format!("converter failed: {}", other),
            source: Some(Box::new(other)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Converter, TextEncoding};
    use chrono::{NaiveDate, TimeDelta};

    fn decode(column: &ColumnDescriptor, bytes: &[u8]) -> DecodedCell {
        decode_cell(RawCell::Bytes(bytes), column, &DecoderOptions::default()).unwrap()
    }

    fn value(field_type: FieldType, bytes: &[u8]) -> Value {
        decode(&ColumnDescriptor::new("c", field_type), bytes).value
    }

    #[test]
    fn test_null_cell() {
        let column = ColumnDescriptor::new("c", FieldType::Long)
            .converter(Converter::new(|_| Ok(Value::Text("never".into()))));
        let cell = decode_cell(RawCell::Null, &column, &DecoderOptions::default()).unwrap();
        assert_eq!(cell.value, Value::Null);
        assert!(!cell.malformed);
    }

    #[test]
    fn test_integers() {
        assert_eq!(value(FieldType::Long, b"42"), Value::Int(42));
        assert_eq!(value(FieldType::Tiny, b"-128"), Value::Int(-128));
        assert_eq!(
            value(FieldType::LongLong, b"-9223372036854775808"),
            Value::Int(i64::MIN)
        );
        let unsigned = ColumnDescriptor::new("c", FieldType::LongLong).unsigned();
        assert_eq!(
            decode(&unsigned, b"18446744073709551615").value,
            Value::UInt(u64::MAX)
        );
        assert_eq!(decode(&unsigned, b"7").value, Value::Int(7));
        assert_eq!(value(FieldType::Long, b"4x2"), Value::Text("4x2".into()));
    }

    #[test]
    fn test_year() {
        assert_eq!(value(FieldType::Year, b"2024"), Value::Int(2024));
        assert_eq!(value(FieldType::Year, b""), Value::Text(String::new()));
    }

    #[test]
    fn test_floats_and_decimals() {
        assert_eq!(value(FieldType::Double, b"1.5e3"), Value::Double(1500.0));
        assert_eq!(value(FieldType::Float, b"-0.25"), Value::Double(-0.25));
        assert_eq!(
            value(FieldType::NewDecimal, b"12345678901234567890.123"),
            Value::Decimal("12345678901234567890.123".into())
        );
        assert_eq!(value(FieldType::Null, b"anything"), Value::Null);
    }

    #[test]
    fn test_floats_are_strict_base_10() {
        assert_eq!(value(FieldType::Double, b"-.5"), Value::Double(-0.5));
        assert_eq!(value(FieldType::Double, b"2."), Value::Double(2.0));
        assert_eq!(value(FieldType::Float, b"+1E-2"), Value::Double(0.01));
        for text in ["inf", "-infinity", "NaN", "nan", "1e", "1e+", ".", "-", "", " 1", "1.5x", "0x10"] {
            assert_eq!(
                value(FieldType::Double, text.as_bytes()),
                Value::Text(text.to_string()),
                "{text}"
            );
        }
    }

    #[test]
    fn test_datetime() {
        assert_eq!(value(FieldType::DateTime, b"0000-00-00 00:00:00"), Value::Null);
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(10, 0, 0, 500_000)
            .unwrap();
        assert_eq!(
            value(FieldType::DateTime, b"2024-02-29 10:00:00.500"),
            Value::DateTime(expected)
        );
        assert_eq!(
            value(FieldType::Timestamp2, b"2024-02-29T10:00:00.500000"),
            Value::DateTime(expected)
        );
    }

    #[test]
    fn test_malformed_temporal_falls_back_to_text() {
        let column = ColumnDescriptor::new("d", FieldType::Date);
        let cell = decode(&column, b"2024-99-99");
        assert_eq!(cell.value, Value::Text("2024-99-99".into()));
        assert!(cell.malformed);

        // Passes the grammar, fails the calendar
        let cell = decode(&column, b"2023-02-29");
        assert_eq!(cell.value, Value::Text("2023-02-29".into()));
        assert!(cell.malformed);

        assert_eq!(value(FieldType::Date, b"0000-00-00"), Value::Null);
    }

    #[test]
    fn test_invalid_value_substitutes() {
        let options = DecoderOptions::new().invalid_value(FieldType::DateTime, Value::Null);
        let column = ColumnDescriptor::new("dt", FieldType::DateTime);
        let cell = decode_cell(RawCell::Bytes(b"garbage"), &column, &options).unwrap();
        assert_eq!(cell.value, Value::Null);
        assert!(cell.malformed);

        // Column substitute wins over the per-type option
        let column = column.invalid_value(Value::Text("n/a".into()));
        let cell = decode_cell(RawCell::Bytes(b"garbage"), &column, &options).unwrap();
        assert_eq!(cell.value, Value::Text("n/a".into()));
    }

    #[test]
    fn test_time_as_duration() {
        assert_eq!(
            value(FieldType::Time, b"-12:30:00"),
            Value::Duration(TimeDelta::seconds(-45_000))
        );
        assert_eq!(
            value(FieldType::Time2, b"838:59:59.000001"),
            Value::Duration(TimeDelta::microseconds(3_020_399_000_001))
        );
        let cell = decode(&ColumnDescriptor::new("t", FieldType::Time), b"12:61:00");
        assert!(cell.malformed);
        assert_eq!(cell.value, Value::Text("12:61:00".into()));
    }

    #[test]
    fn test_strings_and_binary() {
        assert_eq!(value(FieldType::VarString, b"hello"), Value::Text("hello".into()));
        let blob = ColumnDescriptor::new("b", FieldType::Blob).binary();
        assert_eq!(
            decode(&blob, &[0xDE, 0xAD]).value,
            Value::Bytes(vec![0xDE, 0xAD])
        );
        let latin1 = ColumnDescriptor::new("l", FieldType::String)
            .encoding(TextEncoding::from_label("latin1").unwrap());
        assert_eq!(decode(&latin1, b"caf\xe9").value, Value::Text("café".into()));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let column = ColumnDescriptor::new("name", FieldType::VarChar);
        let err = decode_cell(RawCell::Bytes(b"\xff\xfe"), &column, &DecoderOptions::default())
            .unwrap_err();
        match err {
            Error::Decode(e) => {
                assert_eq!(e.kind, DecodeErrorKind::Encoding);
                assert_eq!(e.column.as_deref(), Some("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json() {
        let column = ColumnDescriptor::new("j", FieldType::Json);
        assert_eq!(decode(&column, br#"{"a":1}"#).value, Value::Text(r#"{"a":1}"#.into()));

        let options = DecoderOptions::new().parse_json(true);
        let cell = decode_cell(RawCell::Bytes(br#"{"a":[1,2]}"#), &column, &options).unwrap();
        assert_eq!(cell.value, Value::Json(serde_json::json!({"a": [1, 2]})));

        let cell = decode_cell(RawCell::Bytes(b"{oops"), &column, &options).unwrap();
        assert_eq!(cell.value, Value::Text("{oops".into()));
    }

    #[test]
    fn test_converter_overrides_dispatch() {
        let column = ColumnDescriptor::new("n", FieldType::Long).converter(Converter::new(|input| {
            match input {
                ConverterInput::Text(s) => Ok(Value::Text(format!("<{s}>"))),
                ConverterInput::Bytes(_) => Ok(Value::Null),
            }
        }));
        assert_eq!(decode(&column, b"42").value, Value::Text("<42>".into()));

        let column = ColumnDescriptor::new("b", FieldType::Blob)
            .binary()
            .converter(Converter::new(|input| match input {
                ConverterInput::Bytes(b) => Ok(Value::Int(b.len() as i64)),
                ConverterInput::Text(_) => Ok(Value::Null),
            }));
        assert_eq!(decode(&column, b"abc").value, Value::Int(3));
    }

    #[test]
    fn test_converter_error_names_column() {
        let column = ColumnDescriptor::new("price", FieldType::NewDecimal).converter(
            Converter::new(|_| {
                Err(Error::Decode(DecodeError {
                    kind: DecodeErrorKind::Converter,
                    column: None,
                    message: "nope".into(),
                    source: None,
                }))
            }),
        );
        let err = decode_cell(RawCell::Bytes(b"1.0"), &column, &DecoderOptions::default())
            .unwrap_err();
        match err {
            Error::Decode(e) => assert_eq!(e.column.as_deref(), Some("price")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
