// String expressions
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use super::array::slice_bounds;
use crate::data::{get_path, Record, Value};

fn default_pad() -> String {
    " ".to_string()
}

/// String operation on the string at `path`, discriminated by `operation`.
/// Non-string values yield undefined. Positions count characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum StringExpression {
    Upper { path: String },
    Lower { path: String },
    Trim { path: String },
    Split { path: String, separator: String },
    Substring {
        path: String,
        #[serde(default)]
        start: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<i64>,
    },
    /// Replaces the first occurrence unless `all` is set
    Replace {
        path: String,
        search: String,
        replacement: String,
        #[serde(default)]
        all: bool,
    },
    Length { path: String },
    PadStart {
        path: String,
        length: usize,
        #[serde(default = "default_pad")]
        pad: String,
    },
    PadEnd {
        path: String,
        length: usize,
        #[serde(default = "default_pad")]
        pad: String,
    },
}

impl StringExpression {
    fn path(&self) -> &str {
        match self {
            StringExpression::Upper { path }
            | StringExpression::Lower { path }
            | StringExpression::Trim { path }
            | StringExpression::Split { path, .. }
            | StringExpression::Substring { path, .. }
            | StringExpression::Replace { path, .. }
            | StringExpression::Length { path }
            | StringExpression::PadStart { path, .. }
            | StringExpression::PadEnd { path, .. } => path,
        }
    }

    pub fn evaluate(&self, record: &Record) -> Option<Value> {
        let text = get_path(record, self.path()).and_then(Value::as_str)?;

        let result = match self {
            StringExpression::Upper { .. } => Value::String(text.to_uppercase()),
            StringExpression::Lower { .. } => Value::String(text.to_lowercase()),
            StringExpression::Trim { .. } => Value::String(text.trim().to_string()),
            StringExpression::Split { separator, .. } => {
                let parts: Vec<Value> = if separator.is_empty() {
                    text.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    text.split(separator.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect()
                };
                Value::Array(parts)
            }
            StringExpression::Substring { start, end, .. } => {
                let chars: Vec<char> = text.chars().collect();
                let (from, to) = slice_bounds(*start, *end, chars.len());
                Value::String(chars[from..to].iter().collect())
            }
            StringExpression::Replace {
                search,
                replacement,
                all,
                ..
            } => {
                if *all {
                    Value::String(text.replace(search.as_str(), replacement))
                } else {
                    Value::String(text.replacen(search.as_str(), replacement, 1))
                }
            }
            StringExpression::Length { .. } => Value::Integer(text.chars().count() as i64),
            StringExpression::PadStart { length, pad, .. } => {
                Value::String(format!("{}{}", padding(text, *length, pad)?, text))
            }
            StringExpression::PadEnd { length, pad, .. } => {
                Value::String(format!("{}{}", text, padding(text, *length, pad)?))
            }
        };

        Some(result)
    }
}

/// Longest result `padStart`/`padEnd` will build, in characters
pub const MAX_PAD_LENGTH: usize = 65_536;

/// Fill needed to reach `length`; undefined past `MAX_PAD_LENGTH`
fn padding(text: &str, length: usize, pad: &str) -> Option<String> {
    if length > MAX_PAD_LENGTH {
        return None;
    }

    let missing = length.saturating_sub(text.chars().count());
    if pad.is_empty() {
        return Some(String::new());
    }
    Some(pad.chars().cycle().take(missing).collect())
}
