//! MySQL packet writing utilities.
//!
//! The decoder never writes to the server; this side of the codec builds
//! result-set payloads (rows, EOF, ERR, column definitions) for fixtures
//! and for replaying captured traffic.

#![allow(clippy::cast_possible_truncation)]

use crate::protocol::{MAX_PACKET_SIZE, PacketHeader};

/// A writer for MySQL protocol data.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write a u16 (little-endian).
    pub fn write_u16_le(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a u24 (little-endian, 3 bytes).
    pub fn write_u24_le(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes()[..3]);
    }

    /// Write a u32 (little-endian).
    pub fn write_u32_le(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a u64 (little-endian).
    pub fn write_u64_le(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length-encoded integer.
    ///
    /// - 0x00-0xFA: 1-byte value
    /// - 0xFC + 2 bytes: values up to 2^16
    /// - 0xFD + 3 bytes: values up to 2^24
    /// - 0xFE + 8 bytes: values up to 2^64
    pub fn write_lenenc_int(&mut self, value: u64) {
        if value < 251 {
            self.write_u8(value as u8);
        } else if value < 0x1_0000 {
            self.write_u8(0xFC);
            self.write_u16_le(value as u16);
        } else if value < 0x0100_0000 {
            self.write_u8(0xFD);
            self.write_u24_le(value as u32);
        } else {
            self.write_u8(0xFE);
            self.write_u64_le(value);
        }
    }

    /// Write a length-encoded string.
    pub fn write_lenenc_string(&mut self, s: &str) {
        self.write_lenenc_bytes(s.as_bytes());
    }

    /// Write a length-encoded byte slice.
    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        self.write_lenenc_int(data.len() as u64);
        self.buffer.extend_from_slice(data);
    }

    /// Write the NULL cell marker.
    pub fn write_null(&mut self) {
        self.write_u8(0xFB);
    }

    /// Write one text-protocol cell, `None` being SQL NULL.
    pub fn write_cell(&mut self, cell: Option<&[u8]>) {
        match cell {
            Some(bytes) => self.write_lenenc_bytes(bytes),
            None => self.write_null(),
        }
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Build a complete packet with header and payload.
    pub fn build_packet(&self, sequence_id: u8) -> Vec<u8> {
        build_packet_from_payload(&self.buffer, sequence_id)
    }
}

/// Build the payload of a text-protocol row.
pub fn row_payload(cells: &[Option<&[u8]>]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    for cell in cells {
        writer.write_cell(*cell);
    }
    writer.into_bytes()
}

/// Build the payload of an EOF packet.
pub fn eof_payload(warnings: u16, status_flags: u16) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(5);
    writer.write_u8(0xFE);
    writer.write_u16_le(warnings);
    writer.write_u16_le(status_flags);
    writer.into_bytes()
}

/// Build the payload of an ERR packet (protocol 4.1 layout).
pub fn err_payload(error_code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(9 + message.len());
    writer.write_u8(0xFF);
    writer.write_u16_le(error_code);
    writer.write_u8(b'#');
    writer.write_bytes(sql_state.as_bytes());
    writer.write_bytes(message.as_bytes());
    writer.into_bytes()
}

/// Frame a payload, splitting it into maximum-size chunks as needed.
///
/// A payload whose last chunk is exactly `MAX_PACKET_SIZE` long is followed
/// by an empty packet so the reader knows it ended.
pub fn build_packet_from_payload(payload: &[u8], sequence_id: u8) -> Vec<u8> {
    let chunks = payload.len() / MAX_PACKET_SIZE + 1;
    let mut result = Vec::with_capacity(payload.len() + chunks * PacketHeader::SIZE);
    let mut sequence_id = sequence_id;
    let mut offset = 0;

    loop {
        let chunk_len = (payload.len() - offset).min(MAX_PACKET_SIZE);
        let header = PacketHeader {
            payload_length: chunk_len as u32,
            sequence_id,
        };
        result.extend_from_slice(&header.to_bytes());
        result.extend_from_slice(&payload[offset..offset + chunk_len]);
        offset += chunk_len;
        sequence_id = sequence_id.wrapping_add(1);

        if chunk_len < MAX_PACKET_SIZE {
            break;
        }
    }

    result
}

/// Number of wire packets `build_packet_from_payload` emits for a payload.
pub fn packets_for_payload(len: usize) -> usize {
    len / MAX_PACKET_SIZE + 1
}
