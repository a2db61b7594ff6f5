// Pipeline service: the caller-facing operations of the engine
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{error, info};

use super::{ApiError, PreviewResult};
use crate::pipeline::{
    validate_pipeline, CancellationToken, Orchestrator, Pipeline, PipelineInput, PipelineRun,
    PipelineStatus, RunOptions, Step, TransformStepInput, ValidationResult, Workspace,
};
use crate::storage::{PipelineRepository, RecordStore, StoreRepository};
use crate::utils::EngineConfig;

/// Pipeline service shared by every caller of the engine
pub struct PipelineService {
    store: Arc<dyn RecordStore>,
    repository: Arc<dyn PipelineRepository>,
    config: EngineConfig,
    active_runs: RwLock<HashMap<String, CancellationToken>>,
}

impl PipelineService {
    /// Create a service keeping pipelines and runs in `store` itself
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
        let repository = Arc::new(StoreRepository::new(store.clone()));
        Self::with_repository(store, repository, config)
    }

    pub fn with_repository(
        store: Arc<dyn RecordStore>,
        repository: Arc<dyn PipelineRepository>,
        config: EngineConfig,
    ) -> Self {
        PipelineService {
            store,
            repository,
            config,
            active_runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ensure_valid(&self, input: &PipelineInput) -> Result<(), ApiError> {
        let result = validate_pipeline(input);
        if result.valid {
            Ok(())
        } else {
            Err(ApiError::Validation(result))
        }
    }

    /// Validate and store a new pipeline
    pub fn create_pipeline(&self, input: PipelineInput) -> Result<Pipeline, ApiError> {
        self.ensure_valid(&input)?;

        let pipeline = Pipeline::from_input(input)?;
        self.repository.save_pipeline(&pipeline)?;

        info!("Created pipeline '{}' ({})", pipeline.name, pipeline.id);
        Ok(pipeline)
    }

    pub fn get_pipeline(&self, id: &str) -> Result<Pipeline, ApiError> {
        self.repository
            .find_pipeline(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Pipeline '{}'", id)))
    }

    pub fn list_pipelines(&self) -> Result<Vec<Pipeline>, ApiError> {
        Ok(self.repository.list_pipelines()?)
    }

    /// Replace a pipeline's definition. Nothing is stored when the new
    /// definition is invalid.
    pub fn update_pipeline(&self, id: &str, input: PipelineInput) -> Result<Pipeline, ApiError> {
        let mut pipeline = self.get_pipeline(id)?;
        self.ensure_valid(&input)?;

        pipeline.apply(input)?;
        self.repository.save_pipeline(&pipeline)?;

        info!("Updated pipeline '{}' ({})", pipeline.name, pipeline.id);
        Ok(pipeline)
    }

    /// Delete a pipeline together with its runs
    pub fn delete_pipeline(&self, id: &str) -> Result<(), ApiError> {
        if !self.repository.delete_pipeline(id)? {
            return Err(ApiError::NotFound(format!("Pipeline '{}'", id)));
        }

        let runs = self.repository.delete_runs(id)?;
        info!("Deleted pipeline {} and {} run(s)", id, runs);
        Ok(())
    }

    /// Run a pipeline synchronously and return the finished run
    pub fn run_pipeline(&self, id: &str, options: RunOptions) -> Result<PipelineRun, ApiError> {
        let pipeline = self.get_pipeline(id)?;

        if pipeline.status != PipelineStatus::Active {
            return Err(ApiError::InvalidState(format!(
                "Pipeline '{}' is {:?} and cannot run",
                pipeline.name, pipeline.status
            )));
        }

        let mut run = PipelineRun::new(&pipeline, &options);
        run.start();
        self.repository.save_run(&run)?;

        let token = CancellationToken::new();
        self.register(&run.id, token.clone())?;

        let orchestrator = Orchestrator::new(self.store.as_ref(), &self.config);
        let run = orchestrator.execute(&pipeline, run, &options, &token);

        self.unregister(&run.id)?;
        if let Err(err) = self.repository.save_run(&run) {
            error!("Failed to store run {} of pipeline {}: {}", run.id, pipeline.id, err);
        }

        Ok(run)
    }

    /// Ask an active run to stop before its next step
    pub fn cancel_run(&self, run_id: &str) -> Result<(), ApiError> {
        let runs = self
            .active_runs
            .read()
            .map_err(|_| ApiError::Internal("Failed to acquire read lock".to_string()))?;

        match runs.get(run_id) {
            Some(token) => {
                info!("Cancelling run {}", run_id);
                token.cancel();
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("Active run '{}'", run_id))),
        }
    }

    /// Ids of runs currently executing
    pub fn active_runs(&self) -> Result<Vec<String>, ApiError> {
        let runs = self
            .active_runs
            .read()
            .map_err(|_| ApiError::Internal("Failed to acquire read lock".to_string()))?;
        Ok(runs.keys().cloned().collect())
    }

    fn register(&self, run_id: &str, token: CancellationToken) -> Result<(), ApiError> {
        self.active_runs
            .write()
            .map_err(|_| ApiError::Internal("Failed to acquire write lock".to_string()))?
            .insert(run_id.to_string(), token);
        Ok(())
    }

    fn unregister(&self, run_id: &str) -> Result<(), ApiError> {
        self.active_runs
            .write()
            .map_err(|_| ApiError::Internal("Failed to acquire write lock".to_string()))?
            .remove(run_id);
        Ok(())
    }

    pub fn get_pipeline_run(&self, id: &str) -> Result<PipelineRun, ApiError> {
        self.repository
            .find_run(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Pipeline run '{}'", id)))
    }

    /// Runs of a pipeline, newest first
    pub fn list_pipeline_runs(&self, pipeline_id: &str) -> Result<Vec<PipelineRun>, ApiError> {
        Ok(self.repository.list_runs(pipeline_id)?)
    }

    pub fn validate_pipeline(&self, input: &PipelineInput) -> ValidationResult {
        validate_pipeline(input)
    }

    /// Execute one step against the record store without writing anything,
    /// returning at most `limit` rows (the configured preview limit by default)
    pub fn preview_step(&self, input: TransformStepInput, limit: Option<usize>) -> Result<PreviewResult, ApiError> {
        let step = Step::from_input(input)?;
        let workspace = Workspace::new(self.store.as_ref());

        let output = workspace.execute(&step.config)?;
        let limit = limit.unwrap_or(self.config.preview_limit);

        Ok(PreviewResult::new(output.records.into_iter().take(limit).collect()))
    }
}
