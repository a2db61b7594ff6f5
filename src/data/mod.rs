// Data module for records, values and field paths
// Author: Gabriel Demetrios Lafis

mod compare;
mod csv;
mod json;

pub use compare::*;
pub use self::csv::*;
pub use json::*;

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents a readable source of records
pub trait DataSource {
    /// Read all records from the source
    fn read(&self) -> Result<RecordSet, DataError>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// Represents a writable sink of records
pub trait DataSink {
    /// Write records to the sink, replacing previous content
    fn write(&self, records: &[Record]) -> Result<(), DataError>;

    /// Get the sink name
    fn name(&self) -> &str;
}

/// A single record: an insertion-ordered mapping of field names to values
pub type Record = IndexMap<String, Value>;

/// An ordered sequence of records, the unit every step consumes and produces
pub type RecordSet = Vec<Record>;

/// Represents a value in a record
///
/// Integers and floats are kept apart so integer arithmetic stays exact, but
/// they compare (and hash) numerically equal: `Integer(1) == Float(1.0)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Record),
}

impl Value {
    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Text used when a value is embedded into a larger string.
    /// Nulls render as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                float_as_integer(*b) == Some(*a)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                match float_as_integer(*f) {
                    Some(i) => i.hash(state),
                    None => f.to_bits().hash(state),
                }
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Array(items) => {
                4u8.hash(state);
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
            Value::Object(map) => {
                // Object equality ignores key order, so hash keys in sorted order
                5u8.hash(state);
                map.len().hash(state);
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    key.hash(state);
                    map[key.as_str()].hash(state);
                }
            }
        }
    }
}

/// The integer a float holds exactly, if any. Integer/float equality and
/// hashing compare through it.
fn float_as_integer(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

    if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::Value::from(self.clone());
                write!(f, "{}", json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Record> for Value {
    fn from(map: Record) -> Self {
        Value::Object(map)
    }
}

/// Resolve a dot path (`"user.address.city"`) against a record.
///
/// A key equal to the whole path wins over traversal, so flat keys such as
/// aggregate outputs named `"user.city"` stay addressable. Numeric segments
/// index into arrays. Returns `None` as soon as a segment is missing or the
/// value at a segment cannot be traversed.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    if let Some(value) = record.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Set a value at a dot path, creating (or replacing non-object)
/// intermediate values with objects.
pub fn set_path(record: &mut Record, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = record;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Record::new()));

        if !matches!(entry, Value::Object(_)) {
            *entry = Value::Object(Record::new());
        }

        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }

    current.insert(last.to_string(), value);
}

/// Remove the value at a dot path, preserving the order of remaining fields
pub fn remove_path(record: &mut Record, path: &str) -> Option<Value> {
    if record.contains_key(path) {
        return record.shift_remove(path);
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = record;
    for segment in parents {
        current = match current.get_mut(*segment)? {
            Value::Object(map) => map,
            _ => return None,
        };
    }

    current.shift_remove(*last)
}

/// Represents an error in the data module
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}
