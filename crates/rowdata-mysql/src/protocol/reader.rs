//! MySQL packet reading utilities.
//!
//! Length-encoded integers and strings plus the fixed-width little-endian
//! integers used by EOF, ERR and column definition packets.

#![allow(clippy::cast_possible_truncation)]

use crate::protocol::{EofPacket, ErrPacket};

/// One cell of a text-protocol row, borrowed from the packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCell<'a> {
    /// SQL NULL (0xFB marker)
    Null,
    /// Cell bytes, possibly empty
    Bytes(&'a [u8]),
}

impl<'a> RawCell<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, RawCell::Null)
    }

    pub fn bytes(&self) -> Option<&'a [u8]> {
        match self {
            RawCell::Null => None,
            RawCell::Bytes(b) => Some(b),
        }
    }
}

/// A reader for MySQL protocol data.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Create a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get remaining bytes in the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if we've reached the end of the data.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Peek at the next byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos)?;
        self.pos += 1;
        Some(*byte)
    }

    /// Read a u16 (little-endian).
    pub fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.read_array::<2>()?;
        Some(u16::from_le_bytes(bytes))
    }

    /// Read a u24 (little-endian, 3 bytes).
    pub fn read_u24_le(&mut self) -> Option<u32> {
        let [a, b, c] = self.read_array::<3>()?;
        Some(u32::from_le_bytes([a, b, c, 0]))
    }

    /// Read a u32 (little-endian).
    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.read_array::<4>()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Read a u64 (little-endian).
    pub fn read_u64_le(&mut self) -> Option<u64> {
        let bytes = self.read_array::<8>()?;
        Some(u64::from_le_bytes(bytes))
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// Read a length-encoded integer.
    ///
    /// - 0x00-0xFA: 1-byte value
    /// - 0xFC: 2-byte value follows
    /// - 0xFD: 3-byte value follows
    /// - 0xFE: 8-byte value follows
    /// - 0xFB: NULL
    ///
    /// Returns `None` for NULL, for the reserved 0xFF prefix, and when the
    /// buffer ends before the announced width. A truncated integer is read
    /// as NULL rather than as an error.
    pub fn read_lenenc_int(&mut self) -> Option<u64> {
        let first = self.read_u8()?;
        match first {
            0x00..=0xFA => Some(u64::from(first)),
            0xFC => self.read_u16_le().map(u64::from),
            0xFD => self.read_u24_le().map(u64::from),
            0xFE => self.read_u64_le(),
            0xFB | 0xFF => None,
        }
    }

    /// Read one length-prefixed cell of a text row.
    ///
    /// A declared length longer than what is left of the payload is clamped
    /// to the remaining bytes. This is a leniency kept for compatibility with
    /// servers and proxies that under-fill the last cell; it never over-reads
    /// but it also hides a truncated payload.
    pub fn read_lenenc_cell(&mut self) -> RawCell<'a> {
        let Some(len) = self.read_lenenc_int() else {
            return RawCell::Null;
        };
        let len = usize::try_from(len).unwrap_or(usize::MAX).min(self.remaining());
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        RawCell::Bytes(bytes)
    }

    /// Read a length-encoded byte slice (strict: fails on a short buffer).
    pub fn read_lenenc_bytes(&mut self) -> Option<&'a [u8]> {
        let len = usize::try_from(self.read_lenenc_int()?).ok()?;
        self.read_bytes(len)
    }

    /// Read a length-encoded string, replacing invalid UTF-8.
    pub fn read_lenenc_string(&mut self) -> Option<String> {
        self.read_lenenc_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Read a fixed-length string.
    pub fn read_string(&mut self, len: usize) -> Option<String> {
        let bytes = self.read_bytes(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read remaining data as a string.
    pub fn read_rest_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_rest()).into_owned()
    }

    /// Read a fixed number of bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(bytes)
    }

    /// Read remaining bytes.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        rest
    }

    /// Skip a number of bytes.
    pub fn skip(&mut self, n: usize) -> bool {
        if self.remaining() >= n {
            self.pos += n;
            true
        } else {
            false
        }
    }

    /// Parse an Error packet from the current position.
    ///
    /// ERR packet format (protocol 4.1+):
    /// - 0xFF header
    /// - error_code: 2 bytes
    /// - '#' marker
    /// - sql_state: 5 bytes
    /// - error_message: rest of packet
    pub fn parse_err_packet(&mut self) -> Option<ErrPacket> {
        if self.peek() == Some(0xFF) {
            self.skip(1);
        }

        let error_code = self.read_u16_le()?;

        let sql_state = if self.peek() == Some(b'#') {
            self.skip(1);
            self.read_string(5)?
        } else {
            String::new()
        };

        let error_message = self.read_rest_string();

        Some(ErrPacket {
            error_code,
            sql_state,
            error_message,
        })
    }

    /// Parse an EOF packet from the current position.
    ///
    /// EOF packet format:
    /// - 0xFE header
    /// - warnings: 2 bytes
    /// - status_flags: 2 bytes
    ///
    /// Pre-4.1 servers send a bare 0xFE; missing fields read as zero.
    pub fn parse_eof_packet(&mut self) -> EofPacket {
        if self.peek() == Some(0xFE) {
            self.skip(1);
        }

        let warnings = self.read_u16_le().unwrap_or(0);
        let status_flags = self.read_u16_le().unwrap_or(0);

        EofPacket {
            warnings,
            status_flags,
        }
    }
}
