//! Decoded row representation.

use crate::Result;
use crate::error::{DecodeError, DecodeErrorKind, Error};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::HashMap;
use std::sync::Arc;

/// Column names shared across all rows of a result set.
///
/// Wrapped in `Arc` so every record from the same result shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    ///
    /// If a name repeats, lookups resolve to its first occurrence.
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single decoded row with named access (the "record" output shape).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            type_error(
                None,
                format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
            )
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get_by_name(name)
            .ok_or_else(|| type_error(Some(name), format!("column '{}' not found", name)))?;
        T::from_value(value).map_err(|e| match e {
            Error::Decode(mut de) => {
                de.column = Some(name.to_string());
                Error::Decode(de)
            }
            e => e,
        })
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Consume the row, returning its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

fn type_error(column: Option<&str>, message: String) -> Error {
    Error::Decode(DecodeError {
        kind: DecodeErrorKind::Type,
        column: column.map(str::to_string),
        message,
        source: None,
    })
}

fn mismatch(expected: &str, value: &Value) -> Error {
    type_error(
        None,
        format!("expected {}, found {}", expected, value.type_name()),
    )
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_u64().ok_or_else(|| mismatch("u64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("Vec<u8>", value))
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_date().ok_or_else(|| mismatch("NaiveDate", value))
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_datetime()
            .ok_or_else(|| mismatch("NaiveDateTime", value))
    }
}

impl FromValue for TimeDelta {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_duration().ok_or_else(|| mismatch("TimeDelta", value))
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_json()
            .cloned()
            .ok_or_else(|| mismatch("serde_json::Value", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns = Arc::new(ColumnInfo::new(vec![
            "id".to_string(),
            "name".to_string(),
            "deleted_at".to_string(),
        ]));
        Row::with_columns(
            columns,
            vec![Value::Int(42), Value::Text("hello".into()), Value::Null],
        )
    }

    #[test]
    fn test_row_access() {
        let row = sample();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&Value::Int(42)));
        assert_eq!(row.get_by_name("name"), Some(&Value::Text("hello".into())));
        assert_eq!(row.get_named::<i64>("id").unwrap(), 42);
        assert_eq!(row.get_as::<String>(1).unwrap(), "hello");
        assert_eq!(row.get_named::<Option<i64>>("deleted_at").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_names_column() {
        let row = sample();
        let err = row.get_named::<i64>("name").unwrap_err();
        match err {
            Error::Decode(de) => {
                assert_eq!(de.kind, DecodeErrorKind::Type);
                assert_eq!(de.column.as_deref(), Some("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(row.get_as::<i64>(9).is_err());
    }

    #[test]
    fn test_duplicate_names_resolve_to_first() {
        let info = ColumnInfo::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(info.index_of("a"), Some(0));
        assert_eq!(info.len(), 3);
        assert_eq!(info.name_at(2), Some("a"));
    }

    #[test]
    fn test_iter_pairs() {
        let row = sample();
        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "name", "deleted_at"]);
    }
}
