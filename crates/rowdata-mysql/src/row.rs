//! Row assembly for the row-oriented output modes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rowdata_core::{ColumnInfo, Result, Row, Value};

use crate::config::{DecoderOptions, OutputMode};
use crate::decode::decode_cell;
use crate::protocol::PacketReader;
use crate::types::ColumnDescriptor;

/// One decoded row in the requested shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRecord {
    Tuple(Vec<Value>),
    /// Values with shared name lookup
    Record(Row),
    Dict(HashMap<String, Value>),
}

impl RowRecord {
    pub fn len(&self) -> usize {
        match self {
            RowRecord::Tuple(values) => values.len(),
            RowRecord::Record(row) => row.len(),
            RowRecord::Dict(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look a value up by output name. Tuples have no names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RowRecord::Tuple(_) => None,
            RowRecord::Record(row) => row.get_by_name(name),
            RowRecord::Dict(map) => map.get(name),
        }
    }

    /// Look a value up by position. Dicts have no positions.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RowRecord::Tuple(values) => values.get(index),
            RowRecord::Record(row) => row.get(index),
            RowRecord::Dict(_) => None,
        }
    }
}

/// Output names for a result set.
///
/// A name that repeats an earlier column becomes `table.name`, or stays
/// bare when the column has no table.
pub fn output_names(columns: &[ColumnDescriptor]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(columns.len());
    columns
        .iter()
        .map(|column| {
            if seen.insert(column.name.as_str()) {
                return column.name.clone();
            }
            match &column.table {
                Some(table) => format!("{}.{}", table, column.name),
                None => column.name.clone(),
            }
        })
        .collect()
}

/// Builds row records from row payloads.
#[derive(Debug, Clone)]
pub struct RowAssembler {
    info: Arc<ColumnInfo>,
    mode: OutputMode,
}

impl RowAssembler {
    pub fn new(names: Vec<String>, mode: OutputMode) -> Self {
        Self {
            info: Arc::new(ColumnInfo::new(names)),
            mode,
        }
    }

    pub fn column_info(&self) -> &Arc<ColumnInfo> {
        &self.info
    }

    /// Decode every cell of `payload` and shape the result.
    ///
    /// Returns the record and the number of malformed temporal cells.
    pub fn read_row(
        &self,
        payload: &[u8],
        columns: &[ColumnDescriptor],
        options: &DecoderOptions,
    ) -> Result<(RowRecord, usize)> {
        let mut reader = PacketReader::new(payload);
        let mut values = Vec::with_capacity(columns.len());
        let mut malformed = 0;
        for column in columns {
            let decoded = decode_cell(reader.read_lenenc_cell(), column, options)?;
            malformed += usize::from(decoded.malformed);
            values.push(decoded.value);
        }
        Ok((self.assemble(values), malformed))
    }

    /// Shape decoded values. Columnar mode is handled elsewhere and falls
    /// back to tuples here.
    pub fn assemble(&self, values: Vec<Value>) -> RowRecord {
        match self.mode {
            OutputMode::Tuples | OutputMode::Columnar => RowRecord::Tuple(values),
            OutputMode::Records => RowRecord::Record(Row::with_columns(Arc::clone(&self.info), values)),
            OutputMode::Dicts => RowRecord::Dict(
                self.info
                    .names()
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::row_payload;
    use crate::types::FieldType;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", FieldType::Long).table("users"),
            ColumnDescriptor::new("name", FieldType::VarChar).table("users"),
            ColumnDescriptor::new("id", FieldType::Long).table("orders"),
            ColumnDescriptor::new("name", FieldType::VarChar),
        ]
    }

    #[test]
    fn test_output_names_disambiguate_repeats() {
        assert_eq!(
            output_names(&columns()),
            ["id", "name", "orders.id", "name"]
        );
    }

    #[test]
    fn test_tuple_rows() {
        let cols = columns();
        let assembler = RowAssembler::new(output_names(&cols), OutputMode::Tuples);
        let payload = row_payload(&[Some(b"1"), Some(b"ann"), Some(b"7"), None]);
        let (row, malformed) = assembler
            .read_row(&payload, &cols, &DecoderOptions::default())
            .unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(
            row,
            RowRecord::Tuple(vec![
                Value::Int(1),
                Value::Text("ann".into()),
                Value::Int(7),
                Value::Null
            ])
        );
        assert_eq!(row.get("id"), None);
        assert_eq!(row.get_index(2), Some(&Value::Int(7)));
    }

    #[test]
    fn test_dict_rows() {
        let cols = columns();
        let assembler = RowAssembler::new(output_names(&cols), OutputMode::Dicts);
        let payload = row_payload(&[Some(b"1"), Some(b"ann"), Some(b"7"), Some(b"bob")]);
        let (row, _) = assembler
            .read_row(&payload, &cols, &DecoderOptions::default())
            .unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("orders.id"), Some(&Value::Int(7)));
        // A repeated name without a table overwrites the earlier entry
        assert_eq!(row.get("name"), Some(&Value::Text("bob".into())));
    }

    #[test]
    fn test_record_rows() {
        let cols = columns();
        let assembler = RowAssembler::new(output_names(&cols), OutputMode::Records);
        let payload = row_payload(&[Some(b"1"), Some(b"ann"), Some(b"7"), Some(b"bob")]);
        let (row, _) = assembler
            .read_row(&payload, &cols, &DecoderOptions::default())
            .unwrap();
        match &row {
            RowRecord::Record(r) => {
                assert_eq!(r.len(), 4);
                assert_eq!(r.get_named::<i64>("orders.id").unwrap(), 7);
                // First occurrence wins for a repeated bare name
                assert_eq!(r.get_named::<String>("name").unwrap(), "ann");
            }
            other => panic!("expected record, got {other:?}"),
        }
        assert_eq!(row.get_index(3), Some(&Value::Text("bob".into())));
    }

    #[test]
    fn test_malformed_cells_are_counted() {
        let cols = vec![
            ColumnDescriptor::new("a", FieldType::Date),
            ColumnDescriptor::new("b", FieldType::DateTime),
        ];
        let assembler = RowAssembler::new(output_names(&cols), OutputMode::Tuples);
        let payload = row_payload(&[Some(b"2024-99-99"), Some(b"2024-01-01 00:00:00")]);
        let (row, malformed) = assembler
            .read_row(&payload, &cols, &DecoderOptions::default())
            .unwrap();
        assert_eq!(malformed, 1);
        assert_eq!(row.get_index(0), Some(&Value::Text("2024-99-99".into())));
    }
}
