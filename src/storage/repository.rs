// Pipeline and run persistence on top of a record store
// Author: Gabriel Demetrios Lafis

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::data::{record_from_json, record_to_json, Record, Value};
use crate::pipeline::{Pipeline, PipelineRun};
use super::{RecordFilter, RecordStore, StorageError};

pub const PIPELINES_COLLECTION: &str = "etl_pipelines";
pub const RUNS_COLLECTION: &str = "etl_pipeline_runs";

/// Whether `name` is one of the collections holding pipelines and runs
pub fn is_reserved_collection(name: &str) -> bool {
    name == PIPELINES_COLLECTION || name == RUNS_COLLECTION
}

/// Represents persistence of pipelines and their runs
pub trait PipelineRepository: Send + Sync {
    /// Insert or replace a pipeline
    fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), StorageError>;

    fn find_pipeline(&self, id: &str) -> Result<Option<Pipeline>, StorageError>;

    fn list_pipelines(&self) -> Result<Vec<Pipeline>, StorageError>;

    /// Returns whether the pipeline existed
    fn delete_pipeline(&self, id: &str) -> Result<bool, StorageError>;

    /// Insert or replace a run
    fn save_run(&self, run: &PipelineRun) -> Result<(), StorageError>;

    fn find_run(&self, id: &str) -> Result<Option<PipelineRun>, StorageError>;

    /// Runs of a pipeline, newest first
    fn list_runs(&self, pipeline_id: &str) -> Result<Vec<PipelineRun>, StorageError>;

    /// Returns the number of runs removed
    fn delete_runs(&self, pipeline_id: &str) -> Result<usize, StorageError>;
}

/// Repository storing entities as records in the `etl_pipelines` and
/// `etl_pipeline_runs` collections of a record store
pub struct StoreRepository {
    store: Arc<dyn RecordStore>,
}

fn to_record<T: Serialize>(entity: &T) -> Result<Record, StorageError> {
    Ok(record_from_json(serde_json::to_value(entity)?)?)
}

fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T, StorageError> {
    Ok(serde_json::from_value(record_to_json(record))?)
}

impl StoreRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        StoreRepository { store }
    }

    fn upsert<T: Serialize>(&self, collection: &str, id: &str, entity: &T) -> Result<(), StorageError> {
        let record = to_record(entity)?;
        self.store.delete_where(collection, &RecordFilter::eq("id", id))?;
        self.store.create_many(collection, &[record])?;
        Ok(())
    }

    fn find_by<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<T>, StorageError> {
        if !self.store.has_collection(collection)? {
            return Ok(Vec::new());
        }

        self.store
            .find_all(collection, Some(filter))?
            .iter()
            .map(from_record)
            .collect()
    }
}

impl PipelineRepository for StoreRepository {
    fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), StorageError> {
        self.upsert(PIPELINES_COLLECTION, &pipeline.id, pipeline)
    }

    fn find_pipeline(&self, id: &str) -> Result<Option<Pipeline>, StorageError> {
        let found = self.find_by(PIPELINES_COLLECTION, &RecordFilter::eq("id", id))?;
        Ok(found.into_iter().next())
    }

    fn list_pipelines(&self) -> Result<Vec<Pipeline>, StorageError> {
        let mut pipelines: Vec<Pipeline> = self.find_by(PIPELINES_COLLECTION, &RecordFilter::All)?;
        pipelines.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pipelines)
    }

    fn delete_pipeline(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self
            .store
            .delete_where(PIPELINES_COLLECTION, &RecordFilter::eq("id", id))?;
        Ok(removed > 0)
    }

    fn save_run(&self, run: &PipelineRun) -> Result<(), StorageError> {
        self.upsert(RUNS_COLLECTION, &run.id, run)
    }

    fn find_run(&self, id: &str) -> Result<Option<PipelineRun>, StorageError> {
        let found = self.find_by(RUNS_COLLECTION, &RecordFilter::eq("id", id))?;
        Ok(found.into_iter().next())
    }

    fn list_runs(&self, pipeline_id: &str) -> Result<Vec<PipelineRun>, StorageError> {
        let filter = RecordFilter::eq("pipelineId", Value::from(pipeline_id));
        let mut runs: Vec<PipelineRun> = self.find_by(RUNS_COLLECTION, &filter)?;
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    fn delete_runs(&self, pipeline_id: &str) -> Result<usize, StorageError> {
        self.store
            .delete_where(RUNS_COLLECTION, &RecordFilter::eq("pipelineId", pipeline_id))
    }
}
