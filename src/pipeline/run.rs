// Pipeline run model
// Author: Gabriel Demetrios Lafis

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_order, Pipeline, Step, StepNode};
use crate::data::Record;
use crate::processing::StepType;
use crate::utils::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Outcome of one step within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    pub step_type: StepType,
    pub status: StepStatus,
    pub input_rows: usize,
    pub output_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Name of the record set the step writes
    pub output: String,
}

impl StepResult {
    pub fn pending(step: &Step) -> Self {
        StepResult {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            step_type: step.step_type(),
            status: StepStatus::Pending,
            input_rows: 0,
            output_rows: 0,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
            output: step.output().to_string(),
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, input_rows: usize, output_rows: usize) {
        self.input_rows = input_rows;
        self.output_rows = output_rows;
        self.finish(StepStatus::Completed);
    }

    pub fn fail(&mut self, error: String) {
        self.error = Some(error);
        self.finish(StepStatus::Failed);
    }

    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
    }

    fn finish(&mut self, status: StepStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = self.started_at.map(|start| (now - start).num_milliseconds());
    }
}

/// One execution of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub pipeline_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    pub dry_run: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub step_results: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub context: Record,
}

impl PipelineRun {
    /// A pending run of `pipeline` with one pending result per step, in
    /// execution order
    pub fn new(pipeline: &Pipeline, options: &RunOptions) -> Self {
        PipelineRun {
            id: Uuid::new_v4().to_string(),
            pipeline_id: pipeline.id.clone(),
            status: RunStatus::Pending,
            triggered_by: options.triggered_by.clone(),
            dry_run: options.dry_run,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            step_results: pending_results(pipeline, &execution_order(pipeline)),
            error: None,
            context: options.context.clone(),
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, status: RunStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = self.started_at.map(|start| (now - start).num_milliseconds());
    }

    pub fn step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    pub fn has_failures(&self) -> bool {
        self.step_results.iter().any(|r| r.status == StepStatus::Failed)
    }
}

/// Indexes of `pipeline.steps` in the order they execute; declaration order
/// when the steps form a cycle
pub fn execution_order(pipeline: &Pipeline) -> Vec<usize> {
    let nodes: Vec<StepNode> = pipeline.steps.iter().map(StepNode::from_step).collect();
    resolve_order(&nodes).unwrap_or_else(|_| (0..pipeline.steps.len()).collect())
}

pub(crate) fn pending_results(pipeline: &Pipeline, order: &[usize]) -> Vec<StepResult> {
    order.iter().map(|&i| StepResult::pending(&pipeline.steps[i])).collect()
}

/// Options of a single run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Execute without writing outputs to the record store
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub cleanup_temp_collections: bool,
    pub triggered_by: Option<String>,
    pub context: Record,
}

impl RunOptions {
    /// Options with the engine defaults applied
    pub fn from_config(config: &EngineConfig) -> Self {
        RunOptions {
            continue_on_error: config.continue_on_error,
            cleanup_temp_collections: config.cleanup_temp_collections,
            ..RunOptions::default()
        }
    }
}

/// Shared flag asking a run to stop scheduling steps
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
