// Filter and limit steps
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::Record;
use crate::expression::{matches_all, FilterCondition, Logic};
use super::{single_input, ProcessingError, StepOutput, StepProcessor, StepType};

/// Keep records matching all (`and`) or any (`or`) of the conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub source: String,
    pub output: String,
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub logic: Logic,
}

impl StepProcessor for FilterConfig {
    fn step_type(&self) -> StepType {
        StepType::Filter
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        let records = input
            .iter()
            .filter(|record| matches_all(&self.conditions, self.logic, record))
            .cloned()
            .collect();

        Ok(StepOutput::new(records, input.len()))
    }
}

/// Skip `offset` records, then keep at most `limit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitConfig {
    pub source: String,
    pub output: String,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl StepProcessor for LimitConfig {
    fn step_type(&self) -> StepType {
        StepType::Limit
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        let records = input
            .iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect();

        Ok(StepOutput::new(records, input.len()))
    }
}
