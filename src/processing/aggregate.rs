// Aggregate and pivot steps
// Author: Gabriel Demetrios Lafis

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{get_path, Record, Value};
use crate::expression::{matches_all, ExpressionCondition, Logic};
use super::{group_records, single_input, ProcessingError, StepOutput, StepProcessor, StepType};

/// Represents an aggregation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    First,
    Last,
    Collect,
    CountDistinct,
}

impl AggregateFunction {
    /// Initialize the aggregation state
    pub fn init(&self) -> Accumulator {
        match self {
            AggregateFunction::Sum => Accumulator::Sum {
                int_sum: 0,
                float_sum: 0.0,
                is_float: false,
            },
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::First => Accumulator::First(None),
            AggregateFunction::Last => Accumulator::Last(None),
            AggregateFunction::Collect => Accumulator::Collect(Vec::new()),
            AggregateFunction::CountDistinct => Accumulator::CountDistinct(HashSet::new()),
        }
    }

    /// Aggregate the values of `field` over `records`
    pub fn apply<'a, I>(&self, records: I, field: &str) -> Value
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut state = self.init();
        for record in records {
            state.update(get_path(record, field));
        }
        state.finalize()
    }

    /// Value of a pivot column that has no records in a group, if the
    /// function naturally yields one
    pub fn empty_value(&self) -> Option<Value> {
        match self {
            AggregateFunction::Count | AggregateFunction::CountDistinct => Some(Value::Integer(0)),
            _ => None,
        }
    }
}

/// Running state of one aggregation over one group
#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum {
        int_sum: i64,
        float_sum: f64,
        is_float: bool,
    },
    Avg {
        sum: f64,
        count: usize,
    },
    Count(usize),
    Min(Option<Value>),
    Max(Option<Value>),
    /// Outer `None` until the first record is seen
    First(Option<Value>),
    Last(Option<Value>),
    Collect(Vec<Value>),
    CountDistinct(HashSet<Value>),
}

impl Accumulator {
    /// Update the state with one record's value (`None` = absent)
    pub fn update(&mut self, value: Option<&Value>) {
        match self {
            Accumulator::Sum {
                int_sum,
                float_sum,
                is_float,
            } => match value {
                Some(Value::Integer(i)) if !*is_float => match int_sum.checked_add(*i) {
                    Some(total) => *int_sum = total,
                    None => {
                        *float_sum = *int_sum as f64 + *i as f64;
                        *is_float = true;
                    }
                },
                Some(Value::Integer(i)) => *float_sum += *i as f64,
                Some(Value::Float(f)) => {
                    if !*is_float {
                        *float_sum = *int_sum as f64;
                        *is_float = true;
                    }
                    *float_sum += *f;
                }
                _ => {}
            },
            Accumulator::Avg { sum, count } => {
                if let Some(n) = value.and_then(Value::as_f64) {
                    *sum += n;
                    *count += 1;
                }
            }
            Accumulator::Count(count) => {
                if value.map_or(false, |v| !v.is_null()) {
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, |candidate, best| candidate < best),
            Accumulator::Max(current) => keep_extreme(current, value, |candidate, best| candidate > best),
            Accumulator::First(first) => {
                if first.is_none() {
                    *first = Some(value.cloned().unwrap_or(Value::Null));
                }
            }
            Accumulator::Last(last) => *last = Some(value.cloned().unwrap_or(Value::Null)),
            Accumulator::Collect(items) => {
                if let Some(v) = value {
                    items.push(v.clone());
                }
            }
            Accumulator::CountDistinct(seen) => {
                if let Some(v) = value.filter(|v| !v.is_null()) {
                    seen.insert(v.clone());
                }
            }
        }
    }

    /// Finalize the aggregation and return the result
    pub fn finalize(self) -> Value {
        match self {
            Accumulator::Sum {
                int_sum,
                float_sum,
                is_float,
            } => {
                if is_float {
                    Value::Float(float_sum)
                } else {
                    Value::Integer(int_sum)
                }
            }
            Accumulator::Avg { sum, count } => {
                if count > 0 {
                    Value::Float(sum / count as f64)
                } else {
                    Value::Null
                }
            }
            Accumulator::Count(count) => Value::Integer(count as i64),
            Accumulator::Min(v) | Accumulator::Max(v) | Accumulator::First(v) | Accumulator::Last(v) => {
                v.unwrap_or(Value::Null)
            }
            Accumulator::Collect(items) => Value::Array(items),
            Accumulator::CountDistinct(seen) => Value::Integer(seen.len() as i64),
        }
    }
}

/// Numeric min/max: non-numbers are ignored, the winning value keeps its variant
fn keep_extreme(current: &mut Option<Value>, value: Option<&Value>, better: fn(f64, f64) -> bool) {
    let Some(candidate) = value.filter(|v| v.is_number()) else {
        return;
    };
    let Some(n) = candidate.as_f64() else {
        return;
    };

    let replace = match current.as_ref().and_then(Value::as_f64) {
        Some(best) => better(n, best),
        None => true,
    };

    if replace {
        *current = Some(candidate.clone());
    }
}

/// One computed column of an aggregate row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Source field, or `"*"` with `count` for the group size
    pub field: String,
    pub function: AggregateFunction,
    #[serde(rename = "as")]
    pub alias: String,
}

/// Group records and compute aggregations per group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateConfig {
    pub source: String,
    pub output: String,
    #[serde(default)]
    pub group_by: Vec<String>,
    pub aggregations: Vec<Aggregation>,
    /// Conditions on the aggregated row, all of which must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub having: Vec<ExpressionCondition>,
}

impl AggregateConfig {
    fn aggregate_group(&self, key: &[Value], records: &[&Record]) -> Record {
        let mut row = Record::new();

        for (field, value) in self.group_by.iter().zip(key) {
            row.insert(field.clone(), value.clone());
        }

        for aggregation in &self.aggregations {
            let value = if aggregation.function == AggregateFunction::Count && aggregation.field == "*" {
                Value::Integer(records.len() as i64)
            } else {
                aggregation.function.apply(records.iter().copied(), &aggregation.field)
            };
            row.insert(aggregation.alias.clone(), value);
        }

        row
    }
}

impl StepProcessor for AggregateConfig {
    fn step_type(&self) -> StepType {
        StepType::Aggregate
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        let mut groups = group_records(input, &self.group_by);
        if groups.is_empty() && self.group_by.is_empty() {
            // No groupBy always yields one row, even over nothing
            groups.insert(Vec::new(), Vec::new());
        }

        let records = groups
            .iter()
            .map(|(key, members)| self.aggregate_group(key, members))
            .filter(|row| matches_all(&self.having, Logic::And, row))
            .collect();

        Ok(StepOutput::new(records, input.len()))
    }
}

/// Turn the distinct values of `pivotField` into columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    pub source: String,
    pub output: String,
    pub group_by: Vec<String>,
    pub pivot_field: String,
    pub value_field: String,
    pub aggregation: AggregateFunction,
}

/// Column name for a pivot value
fn column_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl StepProcessor for PivotConfig {
    fn step_type(&self) -> StepType {
        StepType::Pivot
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        // Columns in order of first appearance across the whole input
        let mut columns: Vec<String> = Vec::new();
        for record in input {
            if let Some(value) = get_path(record, &self.pivot_field) {
                let name = column_name(value);
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }

        let mut records = Vec::new();
        for (key, members) in group_records(input, &self.group_by) {
            let mut cells: IndexMap<String, Vec<&Record>> = IndexMap::new();
            for record in members {
                if let Some(value) = get_path(record, &self.pivot_field) {
                    cells.entry(column_name(value)).or_default().push(record);
                }
            }

            let mut row = Record::new();
            for (field, value) in self.group_by.iter().zip(key) {
                row.insert(field.clone(), value);
            }

            for column in &columns {
                match cells.get(column) {
                    Some(cell) => {
                        let value = self.aggregation.apply(cell.iter().copied(), &self.value_field);
                        row.insert(column.clone(), value);
                    }
                    None => {
                        if let Some(zero) = self.aggregation.empty_value() {
                            row.insert(column.clone(), zero);
                        }
                    }
                }
            }

            records.push(row);
        }

        Ok(StepOutput::new(records, input.len()))
    }
}
