// Array expressions
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::{get_path, Record, Value};

fn default_separator() -> String {
    ",".to_string()
}

/// Array operation on the array at `path`, discriminated by `operation`.
/// Anything but an array yields undefined (`includes` yields `false`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum ArrayExpression {
    Length { path: String },
    First { path: String },
    Last { path: String },
    Join {
        path: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Includes { path: String, value: Value },
    /// Negative indexes count from the end
    At { path: String, index: i64 },
    Slice {
        path: String,
        #[serde(default)]
        start: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<i64>,
    },
}

impl ArrayExpression {
    fn path(&self) -> &str {
        match self {
            ArrayExpression::Length { path }
            | ArrayExpression::First { path }
            | ArrayExpression::Last { path }
            | ArrayExpression::Join { path, .. }
            | ArrayExpression::Includes { path, .. }
            | ArrayExpression::At { path, .. }
            | ArrayExpression::Slice { path, .. } => path,
        }
    }

    pub fn evaluate(&self, record: &Record) -> Option<Value> {
        let items = get_path(record, self.path()).and_then(Value::as_array);

        let Some(items) = items else {
            return match self {
                ArrayExpression::Includes { .. } => Some(Value::Boolean(false)),
                _ => None,
            };
        };

        match self {
            ArrayExpression::Length { .. } => Some(Value::Integer(items.len() as i64)),
            ArrayExpression::First { .. } => items.first().cloned(),
            ArrayExpression::Last { .. } => items.last().cloned(),
            ArrayExpression::Join { separator, .. } => {
                let parts: Vec<String> = items.iter().map(Value::to_text).collect();
                Some(Value::String(parts.join(separator)))
            }
            ArrayExpression::Includes { value, .. } => Some(Value::Boolean(items.contains(value))),
            ArrayExpression::At { index, .. } => {
                let position = resolve_index(*index, items.len())?;
                items.get(position).cloned()
            }
            ArrayExpression::Slice { start, end, .. } => {
                let (from, to) = slice_bounds(*start, *end, items.len());
                Some(Value::Array(items[from..to].to_vec()))
            }
        }
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        usize::try_from(index).ok()
    } else {
        len.checked_sub(usize::try_from(index.unsigned_abs()).ok()?)
    }
}

/// Clamp `start..end` (negative = from the end) into `0..=len`, with `from <= to`
pub(crate) fn slice_bounds(start: i64, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        if i < 0 {
            len.saturating_sub(usize::try_from(i.unsigned_abs()).unwrap_or(usize::MAX))
        } else {
            usize::try_from(i).unwrap_or(usize::MAX).min(len)
        }
    };

    let from = clamp(start);
    let to = end.map_or(len, clamp);
    (from, to.max(from))
}
