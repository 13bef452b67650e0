//! MySQL text-protocol result-set decoder.
//!
//! Turns the row packets of a text-protocol result set into typed values:
//!
//! - `protocol`: packet headers, framing, length-encoded cells
//! - `types`: field types, encodings and column descriptors
//! - `temporal`: MySQL's date/time grammar and calendar
//! - `decode`: per-cell decoding with malformed-value fallback
//! - `row` / `columnar`: row records and typed column buffers
//! - `batch`: the driver that pulls packets from a [`Session`]
//!
//! # Example
//!
//! ```rust,ignore
//! use rowdata_mysql::{ColumnDescriptor, DecoderOptions, FieldType, WireSession, start_batch};
//!
//! let columns = vec![
//!     ColumnDescriptor::new("id", FieldType::Long),
//!     ColumnDescriptor::new("name", FieldType::VarChar),
//! ];
//! let mut session = WireSession::new(stream, 2);
//! let mut state = start_batch(columns, DecoderOptions::default())?;
//! while let Some(batch) = state.fetch_batch(&mut session, 1000)? {
//!     if batch.is_empty() {
//!         break;
//!     }
//!     // ...
//! }
//! ```
//!
//! Connection setup, authentication and query submission happen elsewhere;
//! the decoder only reads.

pub mod batch;
pub mod columnar;
pub mod config;
pub mod decode;
pub mod io;
pub mod protocol;
pub mod row;
pub mod temporal;
pub mod types;

pub use batch::{BatchState, DecoderState, OutputBatch, fetch_batch, is_exhausted, start_batch};
pub use columnar::{ColumnBuffer, ColumnarBatch, ColumnarBuffers};
pub use config::{DecoderOptions, OutputMode};
pub use decode::{DecodedCell, decode_cell};
pub use io::{ByteSource, ReaderSource, Session, WireSession};
pub use row::{RowAssembler, RowRecord, output_names};
pub use types::{ColumnDescriptor, Converter, ConverterInput, FieldType, TextEncoding, column_flags};

pub use rowdata_core::{Error, Result, Row, Value};
