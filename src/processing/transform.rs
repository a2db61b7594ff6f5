// Record-shaping steps: map, flatten and unpivot
// Author: Gabriel Demetrios Lafis

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{get_path, remove_path, set_path, Record, Value};
use crate::expression::Expression;
use super::{single_input, ProcessingError, StepOutput, StepProcessor, StepType};

/// Compute derived fields. Every mapping is evaluated against the original
/// record, so mappings never observe each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub source: String,
    pub output: String,
    pub mappings: IndexMap<String, Expression>,
    #[serde(default)]
    pub include_original: bool,
}

impl MapConfig {
    fn map_record(&self, record: &Record) -> Record {
        let mut mapped = if self.include_original {
            record.clone()
        } else {
            Record::new()
        };

        for (target, expression) in &self.mappings {
            match expression.evaluate(record) {
                Some(value) => set_path(&mut mapped, target, value),
                // Undefined leaves the target absent, even over an original field
                None => {
                    remove_path(&mut mapped, target);
                }
            }
        }

        mapped
    }
}

impl StepProcessor for MapConfig {
    fn step_type(&self) -> StepType {
        StepType::Map
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;
        let records = input.iter().map(|record| self.map_record(record)).collect();
        Ok(StepOutput::new(records, input.len()))
    }
}

/// Emit one record per element of the array at `field`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenConfig {
    pub source: String,
    pub output: String,
    pub field: String,
    /// Field receiving the element; `field` itself keeps the array when set
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_field: Option<String>,
    #[serde(default)]
    pub preserve_empty: bool,
}

impl StepProcessor for FlattenConfig {
    fn step_type(&self) -> StepType {
        StepType::Flatten
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;
        let target = self.as_field.as_deref().unwrap_or(&self.field);
        let mut records = Vec::new();

        for record in input {
            let elements = get_path(record, &self.field)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            if elements.is_empty() {
                if self.preserve_empty {
                    let mut kept = record.clone();
                    remove_path(&mut kept, target);
                    records.push(kept);
                }
                continue;
            }

            for element in elements {
                let mut flat = record.clone();
                set_path(&mut flat, target, element.clone());
                records.push(flat);
            }
        }

        Ok(StepOutput::new(records, input.len()))
    }
}

fn default_name_field() -> String {
    "field".to_string()
}

fn default_value_field() -> String {
    "value".to_string()
}

/// Turn columns into rows: one output record per present unpivot field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpivotConfig {
    pub source: String,
    pub output: String,
    #[serde(default)]
    pub id_fields: Vec<String>,
    pub unpivot_fields: Vec<String>,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_value_field")]
    pub value_field: String,
}

impl StepProcessor for UnpivotConfig {
    fn step_type(&self) -> StepType {
        StepType::Unpivot
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;
        let mut records = Vec::with_capacity(input.len() * self.unpivot_fields.len());

        for record in input {
            for field in &self.unpivot_fields {
                let Some(value) = get_path(record, field) else {
                    continue;
                };

                let mut row = Record::new();
                for id in &self.id_fields {
                    if let Some(id_value) = get_path(record, id) {
                        row.insert(id.clone(), id_value.clone());
                    }
                }
                row.insert(self.name_field.clone(), Value::String(field.clone()));
                row.insert(self.value_field.clone(), value.clone());
                records.push(row);
            }
        }

        Ok(StepOutput::new(records, input.len()))
    }
}
