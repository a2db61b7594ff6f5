// Record store filter language
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::{get_path, Record, Value};
use crate::expression::{test_operator, ConditionOperator};

/// Comparison operator of a store filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    StartsWith,
    EndsWith,
}

impl From<FilterOp> for ConditionOperator {
    fn from(op: FilterOp) -> Self {
        match op {
            FilterOp::Eq => ConditionOperator::Eq,
            FilterOp::Ne => ConditionOperator::Ne,
            FilterOp::Gt => ConditionOperator::Gt,
            FilterOp::Gte => ConditionOperator::Gte,
            FilterOp::Lt => ConditionOperator::Lt,
            FilterOp::Lte => ConditionOperator::Lte,
            FilterOp::In => ConditionOperator::In,
            FilterOp::Nin => ConditionOperator::NotIn,
            FilterOp::Contains => ConditionOperator::Contains,
            FilterOp::StartsWith => ConditionOperator::StartsWith,
            FilterOp::EndsWith => ConditionOperator::EndsWith,
        }
    }
}

/// A single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Predicate over stored records, composable with `and`/`or`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordFilter {
    /// Matches every record
    All,
    Field(FieldFilter),
    And(Vec<RecordFilter>),
    Or(Vec<RecordFilter>),
}

impl RecordFilter {
    pub fn field<V: Into<Value>>(field: &str, op: FilterOp, value: V) -> Self {
        RecordFilter::Field(FieldFilter {
            field: field.to_string(),
            op,
            value: value.into(),
        })
    }

    pub fn eq<V: Into<Value>>(field: &str, value: V) -> Self {
        Self::field(field, FilterOp::Eq, value)
    }

    /// Test the filter against a record. The comparison semantics are the
    /// ones of the filter step's conditions.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Field(f) => {
                test_operator(f.op.into(), get_path(record, &f.field), Some(&f.value))
            }
            RecordFilter::And(filters) => filters.iter().all(|f| f.matches(record)),
            RecordFilter::Or(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        RecordFilter::All
    }
}
