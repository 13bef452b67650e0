//! MySQL field types and column descriptors.
//!
//! This module provides:
//! - MySQL field type codes and column flags
//! - Per-column text encodings
//! - The immutable `ColumnDescriptor` a result set is decoded against
//!
//! # MySQL Type System
//!
//! Column definitions carry a one-byte type code. In the text protocol
//! every cell is sent as a length-prefixed string and the type code decides
//! how that string is interpreted.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use encoding_rs::Encoding;
use rowdata_core::{ConfigError, Error, ProtocolError, ProtocolErrorKind, Result, Value};

use crate::protocol::{PacketReader, charset};

/// MySQL field type codes.
///
/// These are the `MYSQL_TYPE_*` constants from the MySQL C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// DECIMAL (MYSQL_TYPE_DECIMAL)
    Decimal = 0x00,
    /// TINYINT (MYSQL_TYPE_TINY)
    Tiny = 0x01,
    /// SMALLINT (MYSQL_TYPE_SHORT)
    Short = 0x02,
    /// INT (MYSQL_TYPE_LONG)
    Long = 0x03,
    /// FLOAT (MYSQL_TYPE_FLOAT)
    Float = 0x04,
    /// DOUBLE (MYSQL_TYPE_DOUBLE)
    Double = 0x05,
    /// NULL (MYSQL_TYPE_NULL)
    Null = 0x06,
    /// TIMESTAMP (MYSQL_TYPE_TIMESTAMP)
    Timestamp = 0x07,
    /// BIGINT (MYSQL_TYPE_LONGLONG)
    LongLong = 0x08,
    /// MEDIUMINT (MYSQL_TYPE_INT24)
    Int24 = 0x09,
    /// DATE (MYSQL_TYPE_DATE)
    Date = 0x0A,
    /// TIME (MYSQL_TYPE_TIME)
    Time = 0x0B,
    /// DATETIME (MYSQL_TYPE_DATETIME)
    DateTime = 0x0C,
    /// YEAR (MYSQL_TYPE_YEAR)
    Year = 0x0D,
    /// NEWDATE (MYSQL_TYPE_NEWDATE) - internal use
    NewDate = 0x0E,
    /// VARCHAR (MYSQL_TYPE_VARCHAR)
    VarChar = 0x0F,
    /// BIT (MYSQL_TYPE_BIT)
    Bit = 0x10,
    /// TIMESTAMP2 (MYSQL_TYPE_TIMESTAMP2)
    Timestamp2 = 0x11,
    /// DATETIME2 (MYSQL_TYPE_DATETIME2)
    DateTime2 = 0x12,
    /// TIME2 (MYSQL_TYPE_TIME2)
    Time2 = 0x13,
    /// JSON (MYSQL_TYPE_JSON)
    Json = 0xF5,
    /// NEWDECIMAL (MYSQL_TYPE_NEWDECIMAL)
    NewDecimal = 0xF6,
    /// ENUM (MYSQL_TYPE_ENUM)
    Enum = 0xF7,
    /// SET (MYSQL_TYPE_SET)
    Set = 0xF8,
    /// TINYBLOB (MYSQL_TYPE_TINY_BLOB)
    TinyBlob = 0xF9,
    /// MEDIUMBLOB (MYSQL_TYPE_MEDIUM_BLOB)
    MediumBlob = 0xFA,
    /// LONGBLOB (MYSQL_TYPE_LONG_BLOB)
    LongBlob = 0xFB,
    /// BLOB (MYSQL_TYPE_BLOB)
    Blob = 0xFC,
    /// VARCHAR (MYSQL_TYPE_VAR_STRING)
    VarString = 0xFD,
    /// CHAR (MYSQL_TYPE_STRING)
    String = 0xFE,
    /// GEOMETRY (MYSQL_TYPE_GEOMETRY)
    Geometry = 0xFF,
}

impl TryFrom<u8> for FieldType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0A => FieldType::Date,
            0x0B => FieldType::Time,
            0x0C => FieldType::DateTime,
            0x0D => FieldType::Year,
            0x0E => FieldType::NewDate,
            0x0F => FieldType::VarChar,
            0x10 => FieldType::Bit,
            0x11 => FieldType::Timestamp2,
            0x12 => FieldType::DateTime2,
            0x13 => FieldType::Time2,
            0xF5 => FieldType::Json,
            0xF6 => FieldType::NewDecimal,
            0xF7 => FieldType::Enum,
            0xF8 => FieldType::Set,
            0xF9 => FieldType::TinyBlob,
            0xFA => FieldType::MediumBlob,
            0xFB => FieldType::LongBlob,
            0xFC => FieldType::Blob,
            0xFD => FieldType::VarString,
            0xFE => FieldType::String,
            0xFF => FieldType::Geometry,
            _ => {
                return Err(Error::Protocol(ProtocolError {
                    kind: ProtocolErrorKind::UnknownTypeCode,
                    message: format!("Unknown type code: {}", value),
                    raw_data: Some(vec![value]),
                }));
            }
        })
    }
}

impl FieldType {
    /// Check if this is an integer type (YEAR excluded).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Tiny
                | FieldType::Short
                | FieldType::Long
                | FieldType::LongLong
                | FieldType::Int24
        )
    }

    /// Check if this is a floating-point type.
    pub const fn is_float(self) -> bool {
        matches!(self, FieldType::Float | FieldType::Double)
    }

    /// Check if this is a decimal type.
    pub const fn is_decimal(self) -> bool {
        matches!(self, FieldType::Decimal | FieldType::NewDecimal)
    }

    /// Types whose cells are passed through as text or bytes.
    pub const fn is_string_like(self) -> bool {
        matches!(
            self,
            FieldType::VarChar
                | FieldType::VarString
                | FieldType::String
                | FieldType::Enum
                | FieldType::Set
                | FieldType::Bit
                | FieldType::Json
                | FieldType::TinyBlob
                | FieldType::MediumBlob
                | FieldType::LongBlob
                | FieldType::Blob
                | FieldType::Geometry
        )
    }

    /// DATETIME and TIMESTAMP in either storage format.
    pub const fn is_datetime(self) -> bool {
        matches!(
            self,
            FieldType::DateTime
                | FieldType::Timestamp
                | FieldType::DateTime2
                | FieldType::Timestamp2
        )
    }

    pub const fn is_date(self) -> bool {
        matches!(self, FieldType::Date | FieldType::NewDate)
    }

    pub const fn is_time(self) -> bool {
        matches!(self, FieldType::Time | FieldType::Time2)
    }

    /// Check if this is a date/time type.
    pub const fn is_temporal(self) -> bool {
        self.is_datetime() || self.is_date() || self.is_time()
    }

    /// Get the type name as a string.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Decimal => "DECIMAL",
            FieldType::Tiny => "TINYINT",
            FieldType::Short => "SMALLINT",
            FieldType::Long => "INT",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Null => "NULL",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::LongLong => "BIGINT",
            FieldType::Int24 => "MEDIUMINT",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Year => "YEAR",
            FieldType::NewDate => "DATE",
            FieldType::VarChar => "VARCHAR",
            FieldType::Bit => "BIT",
            FieldType::Timestamp2 => "TIMESTAMP",
            FieldType::DateTime2 => "DATETIME",
            FieldType::Time2 => "TIME",
            FieldType::Json => "JSON",
            FieldType::NewDecimal => "DECIMAL",
            FieldType::Enum => "ENUM",
            FieldType::Set => "SET",
            FieldType::TinyBlob => "TINYBLOB",
            FieldType::MediumBlob => "MEDIUMBLOB",
            FieldType::LongBlob => "LONGBLOB",
            FieldType::Blob => "BLOB",
            FieldType::VarString => "VARCHAR",
            FieldType::String => "CHAR",
            FieldType::Geometry => "GEOMETRY",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column flags in result set metadata.
pub mod column_flags {
    pub const NOT_NULL: u16 = 1;
    pub const UNSIGNED: u16 = 32;
}

/// Declared text encoding of a column.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// No text encoding: cells are raw bytes
    Binary,
    Utf8,
    /// Any other encoding supported by `encoding_rs`
    Other(&'static Encoding),
}

impl TextEncoding {
    /// Resolve an encoding label.
    ///
    /// Accepts the MySQL charset names `utf8`, `utf8mb3`, `utf8mb4`,
    /// `latin1` and `binary` as well as every WHATWG label.
    pub fn from_label(label: &str) -> Result<Self> {
        let lower = label.trim().to_ascii_lowercase();
        match lower.as_str() {
            "binary" => return Ok(TextEncoding::Binary),
            "utf8" | "utf8mb3" | "utf8mb4" | "utf-8" => return Ok(TextEncoding::Utf8),
            // MySQL's latin1 is cp1252
            "latin1" => return Ok(TextEncoding::Other(encoding_rs::WINDOWS_1252)),
            _ => {}
        }
        match Encoding::for_label(lower.as_bytes()) {
            Some(enc) if enc == encoding_rs::UTF_8 => Ok(TextEncoding::Utf8),
            Some(enc) => Ok(TextEncoding::Other(enc)),
            None => Err(Error::Config(ConfigError {
                message: format!("unknown text encoding: {}", label),
                source: None,
            })),
        }
    }

    /// Map a collation id from a column definition to an encoding.
    ///
    /// Unrecognized ids fall back to UTF-8.
    pub fn from_charset_id(id: u16) -> Self {
        match id {
            charset::BINARY => TextEncoding::Binary,
            charset::LATIN1_SWEDISH_CI | charset::LATIN1_BIN => {
                TextEncoding::Other(encoding_rs::WINDOWS_1252)
            }
            charset::BIG5_CHINESE_CI => TextEncoding::Other(encoding_rs::BIG5),
            charset::UJIS_JAPANESE_CI => TextEncoding::Other(encoding_rs::EUC_JP),
            charset::SJIS_JAPANESE_CI => TextEncoding::Other(encoding_rs::SHIFT_JIS),
            charset::EUCKR_KOREAN_CI => TextEncoding::Other(encoding_rs::EUC_KR),
            charset::GB2312_CHINESE_CI | charset::GBK_CHINESE_CI => {
                TextEncoding::Other(encoding_rs::GBK)
            }
            charset::GREEK_GENERAL_CI => TextEncoding::Other(encoding_rs::ISO_8859_7),
            charset::CP1250_GENERAL_CI => TextEncoding::Other(encoding_rs::WINDOWS_1250),
            charset::CP1251_GENERAL_CI => TextEncoding::Other(encoding_rs::WINDOWS_1251),
            _ => TextEncoding::Utf8,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, TextEncoding::Binary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Binary => "binary",
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Other(enc) => enc.name(),
        }
    }

    /// Strictly decode `bytes`. Returns `None` on malformed input.
    ///
    /// `Binary` decodes as UTF-8, which is what the numeric and temporal
    /// paths need for ASCII digits.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Binary | TextEncoding::Utf8 => {
                std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
            }
            TextEncoding::Other(enc) => enc.decode_without_bom_handling_and_without_replacement(bytes),
        }
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextEncoding({})", self.name())
    }
}

/// What a custom converter receives for a non-NULL cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterInput<'a> {
    /// Cell decoded in the column's text encoding
    Text(&'a str),
    /// Raw cell bytes for binary columns
    Bytes(&'a [u8]),
}

type ConverterFn = dyn Fn(ConverterInput<'_>) -> Result<Value> + Send + Sync;

/// A per-column function that replaces default cell decoding.
#[derive(Clone)]
pub struct Converter(Arc<ConverterFn>);

impl Converter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ConverterInput<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, input: ConverterInput<'_>) -> Result<Value> {
        (self.0)(input)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter(..)")
    }
}

/// Everything the decoder needs to know about one column.
///
/// Fixed once a result set starts decoding.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name (or alias)
    pub name: String,
    /// Table name (or alias), used to disambiguate repeated names
    pub table: Option<String>,
    pub field_type: FieldType,
    /// `column_flags` bitset
    pub flags: u16,
    /// Number of decimals
    pub scale: u8,
    pub encoding: TextEncoding,
    /// Substitute for malformed temporal text
    pub invalid_value: Option<Value>,
    pub converter: Option<Converter>,
}

impl ColumnDescriptor {
    /// Create a UTF-8 descriptor with no flags.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            table: None,
            field_type,
            flags: 0,
            scale: 0,
            encoding: TextEncoding::Utf8,
            invalid_value: None,
            converter: None,
        }
    }

    /// Set the table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the column flags.
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Mark the column unsigned.
    pub fn unsigned(mut self) -> Self {
        self.flags |= column_flags::UNSIGNED;
        self
    }

    /// Set the decimal scale.
    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = scale;
        self
    }

    /// Set the text encoding.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Treat cells as raw bytes.
    pub fn binary(mut self) -> Self {
        self.encoding = TextEncoding::Binary;
        self
    }

    /// Set the substitute for malformed temporal cells.
    pub fn invalid_value(mut self, value: Value) -> Self {
        self.invalid_value = Some(value);
        self
    }

    /// Set a custom converter.
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Check if the column is unsigned.
    pub const fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }

    /// Check if the column is NOT NULL.
    pub const fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }

    /// Parse a protocol 4.1 column definition packet.
    ///
    /// Column definition format:
    /// - catalog, schema, table, org_table, name, org_name: lenenc strings
    /// - length of fixed fields: lenenc int (0x0c)
    /// - charset: 2 bytes
    /// - column_length: 4 bytes
    /// - type: 1 byte
    /// - flags: 2 bytes
    /// - decimals: 1 byte
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::new(payload);
        let truncated = || {
            Error::Protocol(ProtocolError {
                kind: ProtocolErrorKind::MalformedPacket,
                message: "truncated column definition".to_string(),
                raw_data: Some(payload.to_vec()),
            })
        };

        let _catalog = reader.read_lenenc_bytes().ok_or_else(truncated)?;
        let _schema = reader.read_lenenc_bytes().ok_or_else(truncated)?;
        let table = reader.read_lenenc_string().ok_or_else(truncated)?;
        let _org_table = reader.read_lenenc_bytes().ok_or_else(truncated)?;
        let name = reader.read_lenenc_string().ok_or_else(truncated)?;
        let _org_name = reader.read_lenenc_bytes().ok_or_else(truncated)?;
        let _fixed_len = reader.read_lenenc_int().ok_or_else(truncated)?;
        let charset_id = reader.read_u16_le().ok_or_else(truncated)?;
        let _column_length = reader.read_u32_le().ok_or_else(truncated)?;
        let type_code = reader.read_u8().ok_or_else(truncated)?;
        let flags = reader.read_u16_le().ok_or_else(truncated)?;
        let scale = reader.read_u8().ok_or_else(truncated)?;

        Ok(Self {
            name,
            table: if table.is_empty() { None } else { Some(table) },
            field_type: FieldType::try_from(type_code)?,
            flags,
            scale,
            encoding: TextEncoding::from_charset_id(charset_id),
            invalid_value: None,
            converter: None,
        })
    }
}
