// JSON record source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use super::{DataError, DataSink, DataSource, Record, RecordSet, Value};

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => Value::Object(
                obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(b),
            Value::Integer(i) => JsonValue::Number(i.into()),
            // Non-finite floats have no JSON representation
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
            Value::String(s) => JsonValue::String(s),
            Value::Array(items) => JsonValue::Array(items.into_iter().map(JsonValue::from).collect()),
            Value::Object(map) => {
                let mut obj = Map::new();
                for (k, v) in map {
                    obj.insert(k, JsonValue::from(v));
                }
                JsonValue::Object(obj)
            }
        }
    }
}

/// Convert a JSON object into a record
pub fn record_from_json(json: JsonValue) -> Result<Record, DataError> {
    match Value::from(json) {
        Value::Object(record) => Ok(record),
        other => Err(DataError::Parse(format!(
            "Expected a JSON object, found {}",
            other
        ))),
    }
}

/// Convert a record into a JSON object
pub fn record_to_json(record: &Record) -> JsonValue {
    JsonValue::from(Value::Object(record.clone()))
}

/// JSON record source: a file holding an array of objects
pub struct JsonSource {
    path: String,
    array_path: Option<String>,
}

impl JsonSource {
    /// Create a new JSON source whose root is the array
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonSource {
            path: path.as_ref().to_string_lossy().to_string(),
            array_path: None,
        }
    }

    /// Create a new JSON source with a dotted path to the array
    pub fn with_array_path<P: AsRef<Path>, S: Into<String>>(path: P, array_path: S) -> Self {
        JsonSource {
            path: path.as_ref().to_string_lossy().to_string(),
            array_path: Some(array_path.into()),
        }
    }
}

impl DataSource for JsonSource {
    fn read(&self) -> Result<RecordSet, DataError> {
        let file = File::open(&self.path)?;
        let json: JsonValue = serde_json::from_reader(BufReader::new(file))?;

        let mut current = &json;
        if let Some(array_path) = &self.array_path {
            for part in array_path.split('.') {
                current = current.get(part).ok_or_else(|| {
                    DataError::Parse(format!("Path '{}' not found in JSON", array_path))
                })?;
            }
        }

        let items = current.as_array().ok_or_else(|| {
            DataError::Parse(format!("'{}' does not contain a JSON array", self.path))
        })?;

        items.iter().cloned().map(record_from_json).collect()
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// JSON record sink
pub struct JsonSink {
    path: String,
    pretty: bool,
}

impl JsonSink {
    /// Create a new JSON sink
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Self {
        JsonSink {
            path: path.as_ref().to_string_lossy().to_string(),
            pretty,
        }
    }
}

impl DataSink for JsonSink {
    fn write(&self, records: &[Record]) -> Result<(), DataError> {
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);

        let json = JsonValue::Array(records.iter().map(record_to_json).collect());

        if self.pretty {
            serde_json::to_writer_pretty(writer, &json)?;
        } else {
            serde_json::to_writer(writer, &json)?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// Read records from a JSON file, optionally below a dotted array path
pub fn read_json_records<P: AsRef<Path>>(path: P, array_path: Option<&str>) -> Result<RecordSet, DataError> {
    match array_path {
        Some(array_path) => JsonSource::with_array_path(path, array_path).read(),
        None => JsonSource::new(path).read(),
    }
}
