//! Core types for rowdata.
//!
//! This crate provides the pieces shared by every result-set decoder:
//!
//! - `Value` for dynamically-typed decoded cells
//! - `Row` and `ColumnInfo` for named row access
//! - `Error` and `Result` for decoding failures

pub mod error;
pub mod row;
pub mod value;

pub use error::{
    AllocationError, ConfigError, ConnectionError, ConnectionErrorKind, DecodeError,
    DecodeErrorKind, Error, ProtocolError, ProtocolErrorKind, Result, ServerError,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
