//! Decoder options.
//!
//! Options are fixed when a result set starts decoding. They can be built
//! in code or loaded from the JSON options dictionary a client passes down.

use std::collections::HashMap;

use rowdata_core::{ConfigError, Error, Result, Value};
use serde::{Deserialize, Deserializer};

use crate::types::FieldType;

/// Shape of the rows a batch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// One positional value list per row
    #[default]
    Tuples,
    /// Rows with name lookup
    Records,
    /// One map from column name to value per row
    Dicts,
    /// One typed buffer per column
    Columnar,
}

impl OutputMode {
    /// Resolve an option name. Unknown names select tuples.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "namedtuple" | "namedtuples" | "record" | "records" => OutputMode::Records,
            "dict" | "dicts" => OutputMode::Dicts,
            "array" | "arrays" | "numpy" | "dataframe" | "pandas" | "arrow" | "polars" => {
                OutputMode::Columnar
            }
            _ => OutputMode::Tuples,
        }
    }

    pub const fn is_columnar(self) -> bool {
        matches!(self, OutputMode::Columnar)
    }

    pub const fn name(self) -> &'static str {
        match self {
            OutputMode::Tuples => "tuples",
            OutputMode::Records => "namedtuples",
            OutputMode::Dicts => "dicts",
            OutputMode::Columnar => "array",
        }
    }
}

impl<'de> Deserialize<'de> for OutputMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(OutputMode::from_name(&name))
    }
}

/// Options for one result set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Output shape
    pub results_type: OutputMode,
    /// Parse JSON columns into structured values
    pub parse_json: bool,
    /// Stream rows instead of reading the whole result
    pub unbuffered: bool,
    /// Initial row capacity of columnar buffers (default: 100)
    pub initial_capacity: usize,
    /// Per-type substitute for malformed temporal text
    #[serde(skip)]
    pub invalid_values: HashMap<FieldType, Value>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            results_type: OutputMode::Tuples,
            parse_json: false,
            unbuffered: false,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            invalid_values: HashMap::new(),
        }
    }
}

/// Rows allocated per column before the first growth.
pub const DEFAULT_INITIAL_CAPACITY: usize = 100;

impl DecoderOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON object such as
    /// `{"results_type": "dicts", "parse_json": true}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid decoder options: {}", e),
                source: Some(Box::new(e)),
            })
        })?;
        Ok(options.normalized())
    }

    /// Set the output shape.
    pub fn results_type(mut self, mode: OutputMode) -> Self {
        self.results_type = mode;
        self
    }

    /// Enable or disable JSON parsing.
    pub fn parse_json(mut self, enabled: bool) -> Self {
        self.parse_json = enabled;
        self
    }

    /// Enable or disable unbuffered streaming.
    pub fn unbuffered(mut self, enabled: bool) -> Self {
        self.unbuffered = enabled;
        self
    }

    /// Set the initial columnar capacity. Zero is raised to one.
    pub fn initial_capacity(mut self, rows: usize) -> Self {
        self.initial_capacity = rows;
        self.normalized()
    }

    /// Substitute `value` for malformed cells of `field_type`.
    pub fn invalid_value(mut self, field_type: FieldType, value: Value) -> Self {
        self.invalid_values.insert(field_type, value);
        self
    }

    fn normalized(mut self) -> Self {
        self.initial_capacity = self.initial_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DecoderOptions::default();
        assert_eq!(options.results_type, OutputMode::Tuples);
        assert!(!options.parse_json);
        assert!(!options.unbuffered);
        assert_eq!(options.initial_capacity, 100);
        assert!(options.invalid_values.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let options = DecoderOptions::new()
            .results_type(OutputMode::Dicts)
            .parse_json(true)
            .unbuffered(true)
            .initial_capacity(0)
            .invalid_value(FieldType::Date, Value::Text("bad".into()));

        assert_eq!(options.results_type, OutputMode::Dicts);
        assert!(options.parse_json);
        assert!(options.unbuffered);
        assert_eq!(options.initial_capacity, 1);
        assert_eq!(
            options.invalid_values.get(&FieldType::Date),
            Some(&Value::Text("bad".into()))
        );
    }

    #[test]
    fn test_output_mode_names() {
        assert_eq!(OutputMode::from_name("tuple"), OutputMode::Tuples);
        assert_eq!(OutputMode::from_name("tuples"), OutputMode::Tuples);
        assert_eq!(OutputMode::from_name("namedtuple"), OutputMode::Records);
        assert_eq!(OutputMode::from_name("namedtuples"), OutputMode::Records);
        assert_eq!(OutputMode::from_name("dict"), OutputMode::Dicts);
        assert_eq!(OutputMode::from_name("DICTS"), OutputMode::Dicts);
        assert_eq!(OutputMode::from_name("array"), OutputMode::Columnar);
        assert_eq!(OutputMode::from_name("dataframe"), OutputMode::Columnar);
        assert_eq!(OutputMode::from_name("arrow"), OutputMode::Columnar);
        assert_eq!(OutputMode::from_name("something-else"), OutputMode::Tuples);
    }

    #[test]
    fn test_from_json() {
        let options = DecoderOptions::from_json(
            r#"{"results_type": "namedtuple", "parse_json": true, "initial_capacity": 8}"#,
        )
        .unwrap();
        assert_eq!(options.results_type, OutputMode::Records);
        assert!(options.parse_json);
        assert!(!options.unbuffered);
        assert_eq!(options.initial_capacity, 8);

        let options = DecoderOptions::from_json("{}").unwrap();
        assert_eq!(options.initial_capacity, 100);

        let options = DecoderOptions::from_json(r#"{"results_type": "polars"}"#).unwrap();
        assert!(options.results_type.is_columnar());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let err = DecoderOptions::from_json(r#"{"parse_json": "yes"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(DecoderOptions::from_json("not json").is_err());
    }
}
