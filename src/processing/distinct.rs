// Union and deduplicate steps
// Author: Gabriel Demetrios Lafis

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{Record, Value};
use super::{
    compare_records, group_key, single_input, OrderBy, ProcessingError, StepOutput, StepProcessor,
    StepType,
};

/// Identity of a record for distinct checks: the listed keys, or the whole
/// record when no keys are given
fn identity(record: &Record, keys: Option<&[String]>) -> Value {
    match keys {
        Some(keys) if !keys.is_empty() => Value::Array(group_key(record, keys)),
        _ => Value::Object(record.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnionMode {
    #[default]
    All,
    Distinct,
}

/// Concatenate several record sets in listed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionConfig {
    pub sources: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub mode: UnionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_keys: Option<Vec<String>>,
}

impl StepProcessor for UnionConfig {
    fn step_type(&self) -> StepType {
        StepType::Union
    }

    fn sources(&self) -> Vec<&str> {
        self.sources.iter().map(String::as_str).collect()
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        if inputs.is_empty() {
            return Err(ProcessingError::InvalidArgument(
                "union requires at least one source".to_string(),
            ));
        }

        let input_rows = inputs.iter().map(|set| set.len()).sum();
        let all = inputs.iter().flat_map(|set| set.iter());

        let records = match self.mode {
            UnionMode::All => all.cloned().collect(),
            UnionMode::Distinct => {
                let mut seen = HashSet::new();
                all.filter(|record| seen.insert(identity(record, self.distinct_keys.as_deref())))
                    .cloned()
                    .collect()
            }
        };

        Ok(StepOutput::new(records, input_rows))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    #[default]
    First,
    Last,
}

/// Keep one record per distinct key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicateConfig {
    pub source: String,
    pub output: String,
    /// An empty list deduplicates on whole-record equality
    pub keys: Vec<String>,
    #[serde(default)]
    pub keep: Keep,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
}

impl StepProcessor for DeduplicateConfig {
    fn step_type(&self) -> StepType {
        StepType::Deduplicate
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        let mut groups: IndexMap<Value, Vec<&Record>> = IndexMap::new();
        for record in input {
            groups
                .entry(identity(record, Some(self.keys.as_slice())))
                .or_default()
                .push(record);
        }

        let records = groups
            .into_values()
            .filter_map(|mut members| {
                if !self.order_by.is_empty() {
                    members.sort_by(|a, b| compare_records(a, b, &self.order_by));
                }
                let chosen = match self.keep {
                    Keep::First => members.first(),
                    Keep::Last => members.last(),
                };
                chosen.map(|record| (*record).clone())
            })
            .collect();

        Ok(StepOutput::new(records, input.len()))
    }
}
