// Processing module: the twelve step processors
// Author: Gabriel Demetrios Lafis

mod aggregate;
mod distinct;
mod filter;
mod join;
mod sort;
mod transform;

pub use aggregate::*;
pub use distinct::*;
pub use filter::*;
pub use join::*;
pub use sort::*;
pub use transform::*;

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{get_path, Record, RecordSet, Value};
use crate::storage::StorageError;

/// Represents a transformation step that turns input record sets into one
/// output record set
pub trait StepProcessor {
    /// Get the step type
    fn step_type(&self) -> StepType;

    /// Names of the record sets the step reads, in the order `process`
    /// expects them
    fn sources(&self) -> Vec<&str>;

    /// Name of the record set the step creates
    fn output(&self) -> &str;

    /// Run the transformation over the resolved inputs
    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError>;
}

/// Result of running one processor
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub records: RecordSet,
    pub input_rows: usize,
}

impl StepOutput {
    pub fn new(records: RecordSet, input_rows: usize) -> Self {
        StepOutput {
            records,
            input_rows,
        }
    }

    pub fn output_rows(&self) -> usize {
        self.records.len()
    }
}

/// Represents a step type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
    Filter,
    Map,
    Aggregate,
    Join,
    Lookup,
    Union,
    Deduplicate,
    Sort,
    Limit,
    Pivot,
    Unpivot,
    Flatten,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Filter => "filter",
            StepType::Map => "map",
            StepType::Aggregate => "aggregate",
            StepType::Join => "join",
            StepType::Lookup => "lookup",
            StepType::Union => "union",
            StepType::Deduplicate => "deduplicate",
            StepType::Sort => "sort",
            StepType::Limit => "limit",
            StepType::Pivot => "pivot",
            StepType::Unpivot => "unpivot",
            StepType::Flatten => "flatten",
        }
    }

    /// Config keys that must be present for this step type
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            StepType::Filter => &["source", "output", "conditions"],
            StepType::Map => &["source", "output", "mappings"],
            StepType::Aggregate => &["source", "output", "aggregations"],
            StepType::Join => &["left", "right", "output", "on"],
            StepType::Lookup => &["source", "from", "localField", "foreignField", "as", "output"],
            StepType::Union => &["sources", "output"],
            StepType::Deduplicate => &["source", "output", "keys"],
            StepType::Sort => &["source", "output", "orderBy"],
            StepType::Limit => &["source", "output", "limit"],
            StepType::Pivot => &[
                "source",
                "output",
                "groupBy",
                "pivotField",
                "valueField",
                "aggregation",
            ],
            StepType::Unpivot => &["source", "output", "unpivotFields"],
            StepType::Flatten => &["source", "output", "field"],
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed configuration of a step, one variant per step type
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    Filter(FilterConfig),
    Map(MapConfig),
    Aggregate(AggregateConfig),
    Join(JoinConfig),
    Lookup(LookupConfig),
    Union(UnionConfig),
    Deduplicate(DeduplicateConfig),
    Sort(SortConfig),
    Limit(LimitConfig),
    Pivot(PivotConfig),
    Unpivot(UnpivotConfig),
    Flatten(FlattenConfig),
}

fn typed<T: DeserializeOwned>(step_type: StepType, config: &serde_json::Value) -> Result<T, ProcessingError> {
    serde_json::from_value(config.clone())
        .map_err(|e| ProcessingError::InvalidConfig(format!("{} step: {}", step_type, e)))
}

impl StepConfig {
    /// Build the typed config of `step_type` from its loose JSON form
    pub fn parse(step_type: StepType, config: &serde_json::Value) -> Result<Self, ProcessingError> {
        let parsed = match step_type {
            StepType::Filter => StepConfig::Filter(typed(step_type, config)?),
            StepType::Map => StepConfig::Map(typed(step_type, config)?),
            StepType::Aggregate => StepConfig::Aggregate(typed(step_type, config)?),
            StepType::Join => StepConfig::Join(typed(step_type, config)?),
            StepType::Lookup => StepConfig::Lookup(typed(step_type, config)?),
            StepType::Union => StepConfig::Union(typed(step_type, config)?),
            StepType::Deduplicate => StepConfig::Deduplicate(typed(step_type, config)?),
            StepType::Sort => StepConfig::Sort(typed(step_type, config)?),
            StepType::Limit => StepConfig::Limit(typed(step_type, config)?),
            StepType::Pivot => StepConfig::Pivot(typed(step_type, config)?),
            StepType::Unpivot => StepConfig::Unpivot(typed(step_type, config)?),
            StepType::Flatten => StepConfig::Flatten(typed(step_type, config)?),
        };

        Ok(parsed)
    }

    /// The processor implementing this config
    pub fn processor(&self) -> &dyn StepProcessor {
        match self {
            StepConfig::Filter(c) => c,
            StepConfig::Map(c) => c,
            StepConfig::Aggregate(c) => c,
            StepConfig::Join(c) => c,
            StepConfig::Lookup(c) => c,
            StepConfig::Union(c) => c,
            StepConfig::Deduplicate(c) => c,
            StepConfig::Sort(c) => c,
            StepConfig::Limit(c) => c,
            StepConfig::Pivot(c) => c,
            StepConfig::Unpivot(c) => c,
            StepConfig::Flatten(c) => c,
        }
    }

    pub fn step_type(&self) -> StepType {
        self.processor().step_type()
    }

    pub fn sources(&self) -> Vec<&str> {
        self.processor().sources()
    }

    pub fn output(&self) -> &str {
        self.processor().output()
    }

    /// Loose JSON form of the config
    pub fn to_json(&self) -> serde_json::Value {
        let result = match self {
            StepConfig::Filter(c) => serde_json::to_value(c),
            StepConfig::Map(c) => serde_json::to_value(c),
            StepConfig::Aggregate(c) => serde_json::to_value(c),
            StepConfig::Join(c) => serde_json::to_value(c),
            StepConfig::Lookup(c) => serde_json::to_value(c),
            StepConfig::Union(c) => serde_json::to_value(c),
            StepConfig::Deduplicate(c) => serde_json::to_value(c),
            StepConfig::Sort(c) => serde_json::to_value(c),
            StepConfig::Limit(c) => serde_json::to_value(c),
            StepConfig::Pivot(c) => serde_json::to_value(c),
            StepConfig::Unpivot(c) => serde_json::to_value(c),
            StepConfig::Flatten(c) => serde_json::to_value(c),
        };

        // Configs are plain data with string keys; serialization cannot fail
        result.unwrap_or(serde_json::Value::Null)
    }
}

/// Represents an error raised while executing a step
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Unresolved source '{0}': no earlier step output or stored collection has this name")]
    UnresolvedSource(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The single input of a one-source step
pub(crate) fn single_input<'a>(inputs: &[&'a [Record]], step_type: StepType) -> Result<&'a [Record], ProcessingError> {
    match inputs {
        [records] => Ok(records),
        _ => Err(ProcessingError::InvalidArgument(format!(
            "{} step expects 1 input, got {}",
            step_type,
            inputs.len()
        ))),
    }
}

/// Both inputs of a two-source step
pub(crate) fn pair_input<'a>(
    inputs: &[&'a [Record]],
    step_type: StepType,
) -> Result<(&'a [Record], &'a [Record]), ProcessingError> {
    match inputs {
        [first, second] => Ok((first, second)),
        _ => Err(ProcessingError::InvalidArgument(format!(
            "{} step expects 2 inputs, got {}",
            step_type,
            inputs.len()
        ))),
    }
}

/// Key of `record` under `fields`; absent fields key as null
pub(crate) fn group_key(record: &Record, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|field| get_path(record, field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Partition records by `fields`, keeping groups in first-seen order
pub(crate) fn group_records<'a>(records: &'a [Record], fields: &[String]) -> IndexMap<Vec<Value>, Vec<&'a Record>> {
    let mut groups: IndexMap<Vec<Value>, Vec<&Record>> = IndexMap::new();

    for record in records {
        groups.entry(group_key(record, fields)).or_default().push(record);
    }

    groups
}
