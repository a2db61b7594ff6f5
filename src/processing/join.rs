// Join and lookup steps
// Author: Gabriel Demetrios Lafis

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::{get_path, set_path, Record, Value};
use super::{pair_input, ProcessingError, StepOutput, StepProcessor, StepType};

/// Represents a join type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

/// A pair of fields that must be equal for two records to match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinKey {
    pub left: String,
    pub right: String,
}

/// Fields emitted from each side; absent or containing `"*"` means all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JoinSelect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JoinPrefix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    pub left: String,
    pub right: String,
    pub output: String,
    pub on: Vec<JoinKey>,
    #[serde(rename = "type", default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub select: JoinSelect,
    #[serde(default)]
    pub prefix: JoinPrefix,
}

/// Key of a record under `fields`, or `None` when any part is absent or null
fn join_key<'a, I>(record: &Record, fields: I) -> Option<Vec<Value>>
where
    I: IntoIterator<Item = &'a String>,
{
    fields
        .into_iter()
        .map(|field| get_path(record, field).filter(|v| !v.is_null()).cloned())
        .collect()
}

fn project(record: &Record, select: Option<&Vec<String>>) -> Record {
    match select {
        Some(fields) if !fields.iter().any(|f| f == "*") => {
            let mut projected = Record::new();
            for field in fields {
                if let Some(value) = get_path(record, field) {
                    projected.insert(field.clone(), value.clone());
                }
            }
            projected
        }
        _ => record.clone(),
    }
}

fn prefixed(prefix: Option<&str>, field: &str) -> String {
    match prefix {
        Some(p) => format!("{}{}", p, field),
        None => field.to_string(),
    }
}

impl JoinConfig {
    /// Prefixes actually applied to each side's fields
    fn effective_prefixes<'a>(&'a self, left: &[Record], right: &[Record]) -> (Option<&'a str>, Option<&'a str>) {
        let left_prefix = self.prefix.left.as_deref();
        let right_prefix = self.prefix.right.as_deref();

        if left_prefix.is_some() && right_prefix.is_some() {
            return (left_prefix, right_prefix);
        }
        if left_prefix.is_none() && right_prefix.is_none() {
            return (None, None);
        }

        let left_fields: HashSet<&String> = left.iter().flat_map(|r| r.keys()).collect();
        let collides = right.iter().flat_map(|r| r.keys()).any(|k| left_fields.contains(k));

        if collides {
            (left_prefix, right_prefix)
        } else {
            (None, None)
        }
    }
}

impl StepProcessor for JoinConfig {
    fn step_type(&self) -> StepType {
        StepType::Join
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.left, &self.right]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let (left_input, right_input) = pair_input(inputs, self.step_type())?;

        if self.on.is_empty() {
            return Err(ProcessingError::InvalidArgument(
                "join requires at least one 'on' field pair".to_string(),
            ));
        }

        let left: Vec<Record> = left_input
            .iter()
            .map(|r| project(r, self.select.left.as_ref()))
            .collect();
        let right: Vec<Record> = right_input
            .iter()
            .map(|r| project(r, self.select.right.as_ref()))
            .collect();
        let (left_prefix, right_prefix) = self.effective_prefixes(&left, &right);

        let merge = |l: Option<&Record>, r: Option<&Record>| -> Record {
            let mut row = Record::new();
            for (k, v) in l.into_iter().flatten() {
                row.insert(prefixed(left_prefix, k), v.clone());
            }
            for (k, v) in r.into_iter().flatten() {
                row.insert(prefixed(right_prefix, k), v.clone());
            }
            row
        };

        // Keys are read from the unprojected records
        let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for (i, record) in right_input.iter().enumerate() {
            if let Some(key) = join_key(record, self.on.iter().map(|k| &k.right)) {
                index.entry(key).or_default().push(i);
            }
        }

        let keep_left = matches!(self.join_type, JoinType::Left | JoinType::Full);
        let keep_right = matches!(self.join_type, JoinType::Right | JoinType::Full);
        let mut matched_right = vec![false; right.len()];
        let mut records = Vec::new();

        for (i, record) in left_input.iter().enumerate() {
            let matches = join_key(record, self.on.iter().map(|k| &k.left))
                .and_then(|key| index.get(&key))
                .filter(|m| !m.is_empty());

            match matches {
                Some(positions) => {
                    for &j in positions {
                        matched_right[j] = true;
                        records.push(merge(Some(&left[i]), Some(&right[j])));
                    }
                }
                None if keep_left => records.push(merge(Some(&left[i]), None)),
                None => {}
            }
        }

        if keep_right {
            for (j, matched) in matched_right.iter().enumerate() {
                if !matched {
                    records.push(merge(None, Some(&right[j])));
                }
            }
        }

        Ok(StepOutput::new(records, left_input.len() + right_input.len()))
    }
}

/// Attach matching records of `from` to each source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupConfig {
    pub source: String,
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    #[serde(rename = "as")]
    pub as_field: String,
    #[serde(default)]
    pub multiple: bool,
    pub output: String,
}

impl StepProcessor for LookupConfig {
    fn step_type(&self) -> StepType {
        StepType::Lookup
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source, &self.from]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let (source, from) = pair_input(inputs, self.step_type())?;

        let mut index: HashMap<&Value, Vec<&Record>> = HashMap::new();
        for record in from {
            if let Some(key) = get_path(record, &self.foreign_field).filter(|v| !v.is_null()) {
                index.entry(key).or_default().push(record);
            }
        }

        let records = source
            .iter()
            .map(|record| {
                let found = get_path(record, &self.local_field)
                    .filter(|v| !v.is_null())
                    .and_then(|key| index.get(key));

                let attached = if self.multiple {
                    Value::Array(
                        found
                            .map(|m| m.iter().map(|r| Value::Object((*r).clone())).collect())
                            .unwrap_or_default(),
                    )
                } else {
                    found
                        .and_then(|m| m.first())
                        .map(|r| Value::Object((*r).clone()))
                        .unwrap_or(Value::Null)
                };

                let mut enriched = record.clone();
                set_path(&mut enriched, &self.as_field, attached);
                enriched
            })
            .collect();

        Ok(StepOutput::new(records, source.len()))
    }
}
