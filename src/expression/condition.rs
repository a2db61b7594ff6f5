// Conditions evaluated against records by filter, having and conditional
// Author: Gabriel Demetrios Lafis

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::{
    compare_values, ends_with, get_path, starts_with, value_contains, value_in, Record, Value,
};

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Exists,
    IsNull,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

impl ConditionOperator {
    /// Whether the operator compares against a `value`
    pub fn takes_value(&self) -> bool {
        !matches!(self, ConditionOperator::Exists | ConditionOperator::IsNull)
    }
}

/// How a list of conditions is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// A field test: `field <operator> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip)]
    pattern: CompiledPattern,
}

/// `regex` pattern compiled on first use; `None` when invalid
#[derive(Clone, Default)]
struct CompiledPattern(OnceLock<Option<Regex>>);

impl PartialEq for CompiledPattern {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledPattern")
    }
}

/// Condition embedded in a `conditional` expression or a `having` clause
pub type ExpressionCondition = Condition;

/// Condition of a `filter` step
pub type FilterCondition = Condition;

impl Condition {
    pub fn new(field: &str, operator: ConditionOperator, value: Option<Value>) -> Self {
        Condition {
            field: field.to_string(),
            operator,
            value,
            pattern: CompiledPattern::default(),
        }
    }

    /// Test the condition against a record. Never fails: type mismatches
    /// simply do not match.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = get_path(record, &self.field);

        if self.operator == ConditionOperator::Regex {
            return match (actual, self.compiled_pattern()) {
                (Some(Value::String(text)), Some(re)) => re.is_match(text),
                _ => false,
            };
        }

        test_operator(self.operator, actual, self.value.as_ref())
    }

    fn compiled_pattern(&self) -> Option<&Regex> {
        self.pattern
            .0
            .get_or_init(|| match &self.value {
                Some(Value::String(pattern)) => Regex::new(pattern).ok(),
                _ => None,
            })
            .as_ref()
    }
}

/// Apply an operator to a resolved field value (`None` = absent)
pub fn test_operator(operator: ConditionOperator, actual: Option<&Value>, expected: Option<&Value>) -> bool {
    let null = Value::Null;
    let expected = expected.unwrap_or(&null);

    match operator {
        ConditionOperator::Exists => actual.map_or(false, |v| !v.is_null()),
        ConditionOperator::IsNull => actual.map_or(true, Value::is_null),
        ConditionOperator::Eq => actual.unwrap_or(&null) == expected,
        ConditionOperator::Ne => actual.unwrap_or(&null) != expected,
        ConditionOperator::NotIn => match expected {
            Value::Array(_) => !value_in(actual.unwrap_or(&null), expected),
            _ => true,
        },
        _ => {
            let Some(actual) = actual else {
                return false;
            };

            match operator {
                ConditionOperator::Gt => compare_values(actual, expected).map_or(false, |o| o.is_gt()),
                ConditionOperator::Gte => compare_values(actual, expected).map_or(false, |o| o.is_ge()),
                ConditionOperator::Lt => compare_values(actual, expected).map_or(false, |o| o.is_lt()),
                ConditionOperator::Lte => compare_values(actual, expected).map_or(false, |o| o.is_le()),
                ConditionOperator::In => value_in(actual, expected),
                ConditionOperator::Contains => value_contains(actual, expected),
                ConditionOperator::StartsWith => starts_with(actual, expected),
                ConditionOperator::EndsWith => ends_with(actual, expected),
                ConditionOperator::Regex => match (actual, expected) {
                    (Value::String(text), Value::String(pattern)) => {
                        Regex::new(pattern).map_or(false, |re| re.is_match(text))
                    }
                    _ => false,
                },
                _ => false,
            }
        }
    }
}

/// Evaluate a list of conditions combined with `logic`.
/// An empty list matches every record.
pub fn matches_all(conditions: &[Condition], logic: Logic, record: &Record) -> bool {
    if conditions.is_empty() {
        return true;
    }

    match logic {
        Logic::And => conditions.iter().all(|c| c.matches(record)),
        Logic::Or => conditions.iter().any(|c| c.matches(record)),
    }
}
