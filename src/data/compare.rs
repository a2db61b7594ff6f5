// Value comparison shared by predicates, sorting and the record store filter
// Author: Gabriel Demetrios Lafis

use std::cmp::Ordering;

use super::Value;

/// Rank of a value's type in the total ordering used for sorting
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordering for the comparison operators (`gt`, `gte`, `lt`, `lte`).
///
/// Only number/number and string/string pairs are ordered; anything else
/// (including NaN) is incomparable and every ordering operator is false.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

/// Total ordering used by sort and deduplicate.
///
/// Mixed types order null < bool < number < string < array < object.
pub fn total_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ord = total_cmp(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => compare_values(left, right).unwrap_or(Ordering::Equal),
    }
}

/// `contains` semantics: substring for strings, membership for arrays
pub fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Array(items), needle) => items.contains(needle),
        _ => false,
    }
}

/// `in` semantics: the candidate list must be an array
pub fn value_in(value: &Value, candidates: &Value) -> bool {
    match candidates {
        Value::Array(items) => items.contains(value),
        _ => false,
    }
}

pub fn starts_with(value: &Value, prefix: &Value) -> bool {
    match (value, prefix) {
        (Value::String(s), Value::String(p)) => s.starts_with(p.as_str()),
        _ => false,
    }
}

pub fn ends_with(value: &Value, suffix: &Value) -> bool {
    match (value, suffix) {
        (Value::String(s), Value::String(p)) => s.ends_with(p.as_str()),
        _ => false,
    }
}
