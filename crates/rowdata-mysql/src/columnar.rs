//! Columnar output buffers.
//!
//! Each column gets one typed buffer sized by its native element width.
//! Rows are written in place as packets arrive; capacity is shared by all
//! columns and grows by a factor of 1.7 when exhausted.
//!
//! Columnar cells carry no NULL flag, so NULL and unusable cells become
//! sentinels: the type minimum for signed integers, 0 for unsigned
//! integers and YEAR, NaN for floats and `i64::MIN` for temporal columns.

use std::collections::TryReserveError;
use std::str::FromStr;

use rowdata_core::{AllocationError, Error, Result, Value};

use crate::config::DecoderOptions;
use crate::decode;
use crate::protocol::{PacketReader, RawCell};
use crate::temporal::{self, Temporal};
use crate::types::{ColumnDescriptor, FieldType};

/// Sentinel for NULL, zero and malformed temporal cells.
pub const TEMPORAL_NULL: i64 = i64::MIN;

/// One column's values.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnBuffer {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Nanoseconds since the Unix epoch (DATE, DATETIME, TIMESTAMP)
    TimestampNs(Vec<i64>),
    /// Signed nanoseconds (TIME)
    DurationNs(Vec<i64>),
    /// Boxed values (DECIMAL, NULL-typed, text, blobs, JSON)
    Object(Vec<Value>),
}

macro_rules! each_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            ColumnBuffer::I8($v) => $body,
            ColumnBuffer::U8($v) => $body,
            ColumnBuffer::I16($v) => $body,
            ColumnBuffer::U16($v) => $body,
            ColumnBuffer::I32($v) => $body,
            ColumnBuffer::U32($v) => $body,
            ColumnBuffer::I64($v) => $body,
            ColumnBuffer::U64($v) => $body,
            ColumnBuffer::F32($v) => $body,
            ColumnBuffer::F64($v) => $body,
            ColumnBuffer::TimestampNs($v) => $body,
            ColumnBuffer::DurationNs($v) => $body,
            ColumnBuffer::Object($v) => $body,
        }
    };
}

impl ColumnBuffer {
    /// An empty buffer of the element type `column` decodes into.
    pub fn for_column(column: &ColumnDescriptor) -> Self {
        let unsigned = column.is_unsigned();
        match column.field_type {
            FieldType::Tiny if unsigned => ColumnBuffer::U8(Vec::new()),
            FieldType::Tiny => ColumnBuffer::I8(Vec::new()),
            FieldType::Short if unsigned => ColumnBuffer::U16(Vec::new()),
            FieldType::Short => ColumnBuffer::I16(Vec::new()),
            FieldType::Int24 | FieldType::Long if unsigned => ColumnBuffer::U32(Vec::new()),
            FieldType::Int24 | FieldType::Long => ColumnBuffer::I32(Vec::new()),
            FieldType::LongLong if unsigned => ColumnBuffer::U64(Vec::new()),
            FieldType::LongLong => ColumnBuffer::I64(Vec::new()),
            FieldType::Float => ColumnBuffer::F32(Vec::new()),
            FieldType::Double => ColumnBuffer::F64(Vec::new()),
            FieldType::Year => ColumnBuffer::U16(Vec::new()),
            t if t.is_datetime() || t.is_date() => ColumnBuffer::TimestampNs(Vec::new()),
            t if t.is_time() => ColumnBuffer::DurationNs(Vec::new()),
            _ => ColumnBuffer::Object(Vec::new()),
        }
    }

    /// NumPy-style element type string.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ColumnBuffer::I8(_) => "i1",
            ColumnBuffer::U8(_) => "u1",
            ColumnBuffer::I16(_) => "i2",
            ColumnBuffer::U16(_) => "u2",
            ColumnBuffer::I32(_) => "i4",
            ColumnBuffer::U32(_) => "u4",
            ColumnBuffer::I64(_) => "i8",
            ColumnBuffer::U64(_) => "u8",
            ColumnBuffer::F32(_) => "f4",
            ColumnBuffer::F64(_) => "f8",
            ColumnBuffer::TimestampNs(_) => "M8[ns]",
            ColumnBuffer::DurationNs(_) => "m8[ns]",
            ColumnBuffer::Object(_) => "O",
        }
    }

    pub fn len(&self) -> usize {
        each_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_reserve_exact(&mut self, additional: usize) -> std::result::Result<(), TryReserveError> {
        each_buffer!(self, v => v.try_reserve_exact(additional))
    }

    fn truncate(&mut self, len: usize) {
        each_buffer!(self, v => v.truncate(len));
    }

    /// Append one cell, returning whether it was malformed temporal text.
    fn push(
        &mut self,
        cell: RawCell<'_>,
        column: &ColumnDescriptor,
        options: &DecoderOptions,
    ) -> Result<bool> {
        let bytes = cell.bytes();
        let mut malformed = false;
        match self {
            ColumnBuffer::I8(v) => v.push(parse_or(bytes, i8::MIN)),
            ColumnBuffer::U8(v) => v.push(parse_or(bytes, 0)),
            ColumnBuffer::I16(v) => v.push(parse_or(bytes, i16::MIN)),
            ColumnBuffer::U16(v) => v.push(parse_or(bytes, 0)),
            ColumnBuffer::I32(v) => v.push(parse_or(bytes, i32::MIN)),
            ColumnBuffer::U32(v) => v.push(parse_or(bytes, 0)),
            ColumnBuffer::I64(v) => v.push(parse_or(bytes, i64::MIN)),
            ColumnBuffer::U64(v) => v.push(parse_or(bytes, 0)),
            ColumnBuffer::F32(v) => v.push(parse_float_or(bytes, f32::NAN)),
            ColumnBuffer::F64(v) => v.push(parse_float_or(bytes, f64::NAN)),
            ColumnBuffer::TimestampNs(v) => {
                let (nanos, bad) = bytes.map_or((TEMPORAL_NULL, false), |b| {
                    timestamp_nanos(b, column.field_type)
                });
                malformed = bad;
                v.push(nanos);
            }
            ColumnBuffer::DurationNs(v) => {
                let nanos = match bytes.map(temporal::parse_duration) {
                    None => TEMPORAL_NULL,
                    Some(Some(parts)) => parts.nanos(),
                    Some(None) => {
                        malformed = true;
                        TEMPORAL_NULL
                    }
                };
                v.push(nanos);
            }
            ColumnBuffer::Object(v) => {
                let value = match bytes {
                    None => Value::Null,
                    Some(b) => decode::decode_default(b, column, options)?.value,
                };
                v.push(value);
            }
        }
        if malformed {
            tracing::debug!(
                column = %column.name,
                field_type = %column.field_type,
                "malformed temporal cell"
            );
        }
        Ok(malformed)
    }
}

fn parse_or<T: FromStr>(bytes: Option<&[u8]>, sentinel: T) -> T {
    bytes
        .and_then(|b| std::str::from_utf8(b).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(sentinel)
}

fn parse_float_or<T: FromStr>(bytes: Option<&[u8]>, sentinel: T) -> T {
    bytes
        .and_then(decode::float_text)
        .and_then(|s| s.parse().ok())
        .unwrap_or(sentinel)
}

/// Epoch nanoseconds of a DATE or DATETIME cell and whether it was
/// malformed. Dates outside the i64 nanosecond range count as malformed.
fn timestamp_nanos(bytes: &[u8], field_type: FieldType) -> (i64, bool) {
    let nanos = if field_type.is_date() {
        match temporal::parse_date(bytes) {
            Temporal::Zero => return (TEMPORAL_NULL, false),
            Temporal::Valid(parts) => parts.epoch_nanos(),
            Temporal::Invalid => None,
        }
    } else {
        match temporal::parse_datetime(bytes) {
            Temporal::Zero => return (TEMPORAL_NULL, false),
            Temporal::Valid(parts) => parts.epoch_nanos(),
            Temporal::Invalid => None,
        }
    };
    nanos.map_or((TEMPORAL_NULL, true), |n| (n, false))
}

/// Growable per-column buffers for one result set.
#[derive(Debug)]
pub struct ColumnarBuffers {
    names: Vec<String>,
    buffers: Vec<ColumnBuffer>,
    capacity: usize,
    rows: usize,
    growths: usize,
}

impl ColumnarBuffers {
    /// Allocate `initial_capacity` rows for every column.
    pub fn new(
        columns: &[ColumnDescriptor],
        names: Vec<String>,
        initial_capacity: usize,
    ) -> Result<Self> {
        let capacity = initial_capacity.max(1);
        let mut buffers: Vec<ColumnBuffer> = columns.iter().map(ColumnBuffer::for_column).collect();
        for buffer in &mut buffers {
            buffer
                .try_reserve_exact(capacity)
                .map_err(|e| allocation_error(capacity, &e))?;
        }
        Ok(Self {
            names,
            buffers,
            capacity,
            rows: 0,
            growths: 0,
        })
    }

    /// Rows every buffer can hold before the next growth.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// How many times the buffers have grown.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn buffers(&self) -> &[ColumnBuffer] {
        &self.buffers
    }

    /// Decode one row payload into the next slot of every buffer.
    ///
    /// Returns the number of malformed temporal cells. On error no buffer
    /// keeps a partial row.
    pub fn push_row(
        &mut self,
        payload: &[u8],
        columns: &[ColumnDescriptor],
        options: &DecoderOptions,
    ) -> Result<usize> {
        if self.rows == self.capacity {
            self.grow()?;
        }

        let mut reader = PacketReader::new(payload);
        let mut malformed = 0;
        for (i, column) in columns.iter().enumerate() {
            let cell = reader.read_lenenc_cell();
            match self.buffers[i].push(cell, column, options) {
                Ok(bad) => malformed += usize::from(bad),
                Err(e) => {
                    for buffer in &mut self.buffers[..i] {
                        buffer.truncate(self.rows);
                    }
                    return Err(e);
                }
            }
        }
        self.rows += 1;
        Ok(malformed)
    }

    fn grow(&mut self) -> Result<()> {
        // ceil(capacity * 1.7)
        let new_capacity = (self.capacity * 17).div_ceil(10);
        let additional = new_capacity - self.rows;
        for buffer in &mut self.buffers {
            buffer
                .try_reserve_exact(additional)
                .map_err(|e| allocation_error(new_capacity, &e))?;
        }
        tracing::trace!(from = self.capacity, to = new_capacity, "grew columnar buffers");
        self.capacity = new_capacity;
        self.growths += 1;
        Ok(())
    }

    /// Copy of every buffer with its name and the shared row count.
    pub fn snapshot(&self) -> ColumnarBatch {
        ColumnarBatch {
            names: self.names.clone(),
            columns: self.buffers.clone(),
            rows: self.rows,
        }
    }
}

fn allocation_error(rows: usize, err: &TryReserveError) -> Error {
    Error::Allocation(AllocationError {
        requested: rows,
        message: format!("cannot allocate columnar buffers for {} rows: {}", rows, err),
    })
}

/// Columnar output: one named, typed buffer per column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarBatch {
    pub names: Vec<String>,
    pub columns: Vec<ColumnBuffer>,
    /// Shared row count of every column
    pub rows: usize,
}

impl ColumnarBatch {
    pub fn shape(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&ColumnBuffer> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.columns.get(idx)
    }

    pub fn type_tags(&self) -> Vec<&'static str> {
        self.columns.iter().map(ColumnBuffer::type_tag).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnBuffer)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }
}
