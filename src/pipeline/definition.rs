// Pipeline and step definitions
// Author: Gabriel Demetrios Lafis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::Record;
use crate::processing::{ProcessingError, StepConfig, StepType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Active,
    Paused,
    Disabled,
}

/// A stored pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub status: PipelineStatus,
    /// Cron expression kept for external schedulers; never interpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub metadata: Record,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Build a new pipeline from caller input, assigning ids and timestamps
    pub fn from_input(input: PipelineInput) -> Result<Self, ProcessingError> {
        let now = Utc::now();
        let steps = Step::from_inputs(input.steps)?;

        Ok(Pipeline {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            steps,
            status: input.status,
            schedule: input.schedule,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the definition with `input`, keeping id and creation time
    pub fn apply(&mut self, input: PipelineInput) -> Result<(), ProcessingError> {
        self.steps = Step::from_inputs(input.steps)?;
        self.name = input.name;
        self.description = input.description;
        self.status = input.status;
        self.schedule = input.schedule;
        self.metadata = input.metadata;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn to_input(&self) -> PipelineInput {
        PipelineInput {
            name: self.name.clone(),
            description: self.description.clone(),
            steps: self.steps.iter().map(Step::to_input).collect(),
            status: self.status,
            schedule: self.schedule.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// One configured transformation of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransformStepInput", into = "TransformStepInput")]
pub struct Step {
    pub id: String,
    pub name: String,
    pub config: StepConfig,
    /// Scheduling priority among steps that are ready at the same time
    pub order: i64,
    pub depends_on: Vec<String>,
}

impl Step {
    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }

    pub fn sources(&self) -> Vec<&str> {
        self.config.sources()
    }

    pub fn output(&self) -> &str {
        self.config.output()
    }

    /// Parse a step input; a missing id is generated
    pub fn from_input(input: TransformStepInput) -> Result<Self, ProcessingError> {
        let config = StepConfig::parse(input.step_type, &input.config)?;
        let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = if input.name.is_empty() { id.clone() } else { input.name };

        Ok(Step {
            id,
            name,
            config,
            order: input.order,
            depends_on: input.depends_on,
        })
    }

    fn from_inputs(inputs: Vec<TransformStepInput>) -> Result<Vec<Self>, ProcessingError> {
        inputs.into_iter().map(Step::from_input).collect()
    }

    pub fn to_input(&self) -> TransformStepInput {
        TransformStepInput {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            step_type: self.step_type(),
            config: self.config.to_json(),
            order: self.order,
            depends_on: self.depends_on.clone(),
        }
    }
}

impl TryFrom<TransformStepInput> for Step {
    type Error = ProcessingError;

    fn try_from(input: TransformStepInput) -> Result<Self, Self::Error> {
        Step::from_input(input)
    }
}

impl From<Step> for TransformStepInput {
    fn from(step: Step) -> Self {
        step.to_input()
    }
}

/// Caller-supplied pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<TransformStepInput>,
    #[serde(default)]
    pub status: PipelineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub metadata: Record,
}

/// Caller-supplied step definition with its config in loose JSON form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStepInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl TransformStepInput {
    pub fn new(id: &str, step_type: StepType, config: serde_json::Value) -> Self {
        TransformStepInput {
            id: Some(id.to_string()),
            name: id.to_string(),
            step_type,
            config,
            order: 0,
            depends_on: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(|s| s.to_string()).collect();
        self
    }
}
