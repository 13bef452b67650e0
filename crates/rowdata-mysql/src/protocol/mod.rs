//! MySQL wire protocol, result-set side.
//!
//! MySQL packets have a 4-byte header:
//! - 3 bytes: payload length (little-endian)
//! - 1 byte: sequence number
//!
//! Maximum packet payload is 2^24 - 1 (16MB - 1). Larger payloads
//! are split into multiple packets.

pub mod framer;
pub mod reader;
pub mod writer;

pub use framer::{Frame, Packet, next_packet};
pub use reader::{PacketReader, RawCell};
pub use writer::{PacketWriter, build_packet_from_payload, eof_payload, err_payload, row_payload};

use rowdata_core::ServerError;

/// Maximum payload size for a single MySQL packet (2^24 - 1 bytes).
pub const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

/// MySQL server status flags.
pub mod server_status {
    /// Another result set follows this one
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
}

/// MySQL character set ids seen in column definitions.
pub mod charset {
    pub const BIG5_CHINESE_CI: u16 = 1;
    pub const LATIN1_SWEDISH_CI: u16 = 8;
    pub const UJIS_JAPANESE_CI: u16 = 12;
    pub const SJIS_JAPANESE_CI: u16 = 13;
    pub const EUCKR_KOREAN_CI: u16 = 19;
    pub const GB2312_CHINESE_CI: u16 = 24;
    pub const GREEK_GENERAL_CI: u16 = 25;
    pub const CP1250_GENERAL_CI: u16 = 26;
    pub const GBK_CHINESE_CI: u16 = 28;
    pub const UTF8_GENERAL_CI: u16 = 33;
    pub const UTF8MB4_GENERAL_CI: u16 = 45;
    pub const LATIN1_BIN: u16 = 47;
    pub const CP1251_GENERAL_CI: u16 = 51;
    pub const BINARY: u16 = 63;
    pub const UTF8_BIN: u16 = 83;
    pub const UTF8MB4_UNICODE_CI: u16 = 224;
    pub const UTF8MB4_0900_AI_CI: u16 = 255;
}

/// A MySQL packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload length (3 bytes, max 16MB - 1)
    pub payload_length: u32,
    /// Sequence number (wraps at 255)
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Total header size in bytes.
    pub const SIZE: usize = 4;

    /// Parse a packet header from 4 bytes.
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        let payload_length =
            u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);
        Self {
            payload_length,
            sequence_id: bytes[3],
        }
    }

    /// Encode the header to 4 bytes.
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            (self.payload_length & 0xFF) as u8,
            ((self.payload_length >> 8) & 0xFF) as u8,
            ((self.payload_length >> 16) & 0xFF) as u8,
            self.sequence_id,
        ]
    }

    /// A packet of exactly the maximum size is continued by the next one.
    pub fn is_continued(&self) -> bool {
        self.payload_length as usize == MAX_PACKET_SIZE
    }
}

/// Classification of a reassembled result-set payload.
///
/// Inside a text result set a leading 0x00 or 0xFB is a row whose first
/// cell is empty or NULL, so only ERR and EOF are distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Error packet (0xFF)
    Error,
    /// EOF packet (0xFE with payload < 9 bytes)
    Eof,
    /// Row data
    Data,
}

impl PacketType {
    /// Detect packet type from the first byte of payload.
    pub fn from_first_byte(byte: u8, payload_len: usize) -> Self {
        match byte {
            0xFF => PacketType::Error,
            0xFE if payload_len < 9 => PacketType::Eof,
            _ => PacketType::Data,
        }
    }

    /// Classify a full payload. Empty payloads are row data.
    pub fn of_payload(payload: &[u8]) -> Self {
        payload
            .first()
            .map_or(PacketType::Data, |&b| Self::from_first_byte(b, payload.len()))
    }
}

/// Parsed Error packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Error code
    pub error_code: u16,
    /// SQL state (5 characters)
    pub sql_state: String,
    /// Error message
    pub error_message: String,
}

impl From<ErrPacket> for ServerError {
    fn from(err: ErrPacket) -> Self {
        ServerError {
            code: err.error_code,
            sql_state: err.sql_state,
            message: err.error_message,
        }
    }
}

/// Parsed EOF packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    /// Number of warnings
    pub warnings: u16,
    /// Server status flags
    pub status_flags: u16,
}

impl EofPacket {
    /// Whether another result set follows this one.
    pub fn has_more_results(&self) -> bool {
        self.status_flags & server_status::SERVER_MORE_RESULTS_EXISTS != 0
    }
}
